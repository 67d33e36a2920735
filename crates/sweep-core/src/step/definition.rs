use serde::{Deserialize, Serialize};
use std::fmt;
use sweep_domain::WorkflowConfig;

use crate::errors::StepError;
use crate::model::{PointContext, StepArtifact};

/// Cuándo se ejecuta un step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Una vez por punto del barrido.
    #[default]
    ForEach,
    /// Una vez por barrido, tras todos los puntos.
    ForAll,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::ForEach => f.write_str("for_each"),
            ExecutionMode::ForAll => f.write_str("for_all"),
        }
    }
}

/// Contrato de una etapa del pipeline.
///
/// Un step no guarda estado entre puntos: los ajustes se fijan al
/// construirlo (vía `StepFactory`) y todo lo demás llega por `ctx`. Sólo
/// escribe bajo su `step_dir` y su directorio de resultados compartido.
pub trait Step: Send + Sync + fmt::Debug {
    /// Identificador estable en minúsculas.
    fn name(&self) -> &str;

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::ForEach
    }

    /// Si es `true` y `is_done` también, `run` no vuelve a ejecutar.
    fn skip_if_done(&self) -> bool {
        true
    }

    /// Ubicación declarada del artifact que produce para `ctx`.
    fn output(&self, ctx: &PointContext) -> StepArtifact;

    /// Sin efectos. Por defecto, el artifact declarado está completo según
    /// el store del contexto.
    fn is_done(&self, ctx: &PointContext) -> bool {
        ctx.store().is_complete(&self.output(ctx))
    }

    /// Realiza el trabajo. `previous` es el artifact del step anterior
    /// (`None` para el primero).
    fn execute(&self,
               config: &WorkflowConfig,
               ctx: &PointContext,
               previous: Option<&StepArtifact>)
               -> Result<StepArtifact, StepError>;

    /// Ejecución con reanudación: si ya está hecho devuelve `output(ctx)`
    /// sin llamar a `execute`.
    fn run(&self,
           config: &WorkflowConfig,
           ctx: &PointContext,
           previous: Option<&StepArtifact>)
           -> Result<StepArtifact, StepError> {
        if self.skip_if_done() && self.is_done(ctx) {
            log::info!("[{}] {} already done, skipping", ctx.job_name(), self.name());
            return Ok(self.output(ctx));
        }
        self.execute(config, ctx, previous)
    }
}
