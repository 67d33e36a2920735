//! Estado y reporte de la ejecución de un punto.
use chrono::{DateTime, Utc};
use serde::Serialize;
use sweep_domain::JobName;
use uuid::Uuid;

use crate::errors::{PipelineError, StepError};
use crate::model::StepArtifact;

/// Estado de la cadena de un punto.
///
/// Transiciones válidas:
/// - `Pending` -> `Running(0)` -> ... -> `Running(n-1)` -> `Done`
/// - `Running(i)` -> `Failed { step_index: i, .. }`
/// - `Pending` -> `Cancelled` (el barrido se detuvo antes de empezar el punto)
#[derive(Debug)]
pub enum PointState {
    Pending,
    Running(usize),
    /// Artifact del último step (`None` si la cadena no tiene steps).
    Done(Option<StepArtifact>),
    Failed {
        step_index: usize,
        step: String,
        cause: StepError,
    },
    Cancelled,
}

impl PointState {
    pub fn is_done(&self) -> bool {
        matches!(self, PointState::Done(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PointState::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PointState::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PointState::Pending => "pending",
            PointState::Running(_) => "running",
            PointState::Done(_) => "done",
            PointState::Failed { .. } => "failed",
            PointState::Cancelled => "cancelled",
        }
    }
}

/// Resultado de ejecutar (o no) la cadena de un punto.
#[derive(Debug)]
pub struct PointReport {
    pub job_name: JobName,
    pub state: PointState,
    /// Artifacts producidos o reutilizados, en orden de la cadena.
    pub artifacts: Vec<StepArtifact>,
    /// Steps cuyo artifact ya estaba completo.
    pub skipped: Vec<String>,
    /// Intentos realizados (0 si cancelado).
    pub attempts: u32,
    pub fingerprint: Option<String>,
}

impl PointReport {
    pub(crate) fn new(job_name: JobName) -> Self {
        Self { job_name,
               state: PointState::Pending,
               artifacts: Vec::new(),
               skipped: Vec::new(),
               attempts: 0,
               fingerprint: None }
    }

    pub(crate) fn cancelled(job_name: JobName) -> Self {
        Self { state: PointState::Cancelled,
               ..Self::new(job_name) }
    }

    /// Error de ejecución retryable en el último intento.
    pub fn is_retryable_failure(&self) -> bool {
        matches!(&self.state, PointState::Failed { cause, .. } if cause.is_retryable())
    }

    /// `Done` → artifact final; `Failed` → `PipelineError`. Un punto
    /// cancelado se reporta como fallo de ejecución en su primer step.
    pub fn into_result(self) -> Result<Option<StepArtifact>, PipelineError> {
        let job_name = self.job_name.to_string();
        match self.state {
            PointState::Done(artifact) => Ok(artifact),
            PointState::Failed { step_index, step, cause } => Err(PipelineError { step_index,
                                                                                  step,
                                                                                  job_name,
                                                                                  cause }),
            other => Err(PipelineError { step_index: 0,
                                         step: String::new(),
                                         cause: StepError::execution("", format!("point did not run (state: {})", other.label())),
                                         job_name }),
        }
    }
}

/// Fila serializable de un punto para resúmenes.
#[derive(Debug, Clone, Serialize)]
pub struct PointSummary {
    pub job_name: String,
    pub state: &'static str,
    pub attempts: u32,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub artifact: Option<String>,
}

impl From<&PointReport> for PointSummary {
    fn from(report: &PointReport) -> Self {
        let (failed_step, error) = match &report.state {
            PointState::Failed { step, cause, .. } => (Some(step.clone()), Some(cause.to_string())),
            _ => (None, None),
        };
        Self { job_name: report.job_name.to_string(),
               state: report.state.label(),
               attempts: report.attempts,
               failed_step,
               error,
               artifact: report.artifacts.last().map(ToString::to_string) }
    }
}

/// Resultado de un barrido completo.
#[derive(Debug)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub definition_hash: String,
    /// Reportes por punto en orden del barrido.
    pub points: Vec<PointReport>,
    /// Cadena `for_all`, si el workflow tiene steps de ese modo y se ejecutó.
    pub sweep: Option<PointReport>,
}

impl SweepReport {
    pub fn done(&self) -> usize {
        self.points.iter().filter(|p| p.state.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.points.iter().filter(|p| p.state.is_failed()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.points.iter().filter(|p| p.state.is_cancelled()).count()
    }

    /// Todos los puntos y la cadena `for_all` (si hubo) terminaron.
    pub fn is_success(&self) -> bool {
        self.done() == self.points.len() && self.sweep.as_ref().map_or(true, |s| s.state.is_done())
    }

    pub fn summaries(&self) -> Vec<PointSummary> {
        self.points.iter().chain(self.sweep.iter()).map(PointSummary::from).collect()
    }
}
