//! Step `manifest` (`for_all`): escribe un índice JSON del barrido con los
//! puntos terminados y, por cada directorio de resultados configurado, las
//! copias publicadas que existen.
//!
//! Ajustes: `file` (`manifest.json`), `results` (`directorio → extensión`),
//! `skip_if_done` (por defecto `false`: el índice se rehace en cada
//! barrido).
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fs;
use sweep_core::{ExecutionMode, PointContext, Scope, Step, StepArtifact, StepError};
use sweep_domain::WorkflowConfig;

use crate::process::discard;
use crate::settings::parse;

pub const NAME: &str = "manifest";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestParams {
    name: Option<String>,
    #[serde(default = "default_file")]
    file: String,
    #[serde(default)]
    results: Map<String, Value>,
    #[serde(default)]
    skip_if_done: bool,
}

fn default_file() -> String {
    "manifest.json".to_string()
}

#[derive(Debug)]
pub struct ManifestStep {
    name: String,
    params: ManifestParams,
}

impl ManifestStep {
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, StepError> {
        let params: ManifestParams = parse(NAME, settings)?;
        let name = params.name.clone().unwrap_or_else(|| NAME.to_string());
        if let Some((dir, _)) = params.results.iter().find(|(_, ext)| !ext.is_string()) {
            return Err(StepError::configuration(&name, format!("extension for '{dir}' must be a string")));
        }
        Ok(Self { name, params })
    }
}

impl Step for ManifestStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::ForAll
    }

    fn skip_if_done(&self) -> bool {
        self.params.skip_if_done
    }

    fn output(&self, ctx: &PointContext) -> StepArtifact {
        StepArtifact::new(ctx.step_dir(&self.name).join(&self.params.file))
    }

    fn execute(&self,
               config: &WorkflowConfig,
               ctx: &PointContext,
               _previous: Option<&StepArtifact>)
               -> Result<StepArtifact, StepError> {
        let members = match ctx.scope() {
            Scope::Sweep { members } => members,
            Scope::Point => return Err(StepError::configuration(&self.name, "manifest must run in for_all mode")),
        };

        let mut results = Map::new();
        for (dir, ext) in &self.params.results {
            let ext = ext.as_str().unwrap_or_default();
            let files: Vec<Value> = members.iter()
                                           .map(|job| ctx.layout().published(dir, job, ext))
                                           .filter(|p| p.is_file())
                                           .map(|p| Value::String(p.to_string_lossy().into_owned()))
                                           .collect();
            results.insert(dir.clone(), Value::Array(files));
        }

        let points: Vec<Value> = members.iter()
                                        .map(|job| {
                                            json!({
                                                "job_name": job,
                                                "dir": ctx.layout().point_dir(job).to_string_lossy()
                                            })
                                        })
                                        .collect();
        let manifest = json!({
            "topology": config.topology,
            "energy": config.energy,
            "workflow": config.workflow,
            "points": points,
            "results": results
        });

        let step_dir = ctx.step_dir(&self.name);
        fs::create_dir_all(&step_dir).map_err(|e| StepError::io(&self.name, &step_dir, e))?;
        let artifact = self.output(ctx);
        let body = serde_json::to_string_pretty(&manifest).map_err(|e| StepError::execution(&self.name, e.to_string()))?;
        if let Err(e) = fs::write(artifact.path(), body) {
            discard(&self.name, artifact.path());
            return Err(StepError::io(&self.name, artifact.path(), e));
        }
        log::info!("[{}] indexed {} points in {}", self.name, members.len(), artifact);
        Ok(artifact)
    }
}

pub fn factory(settings: &Map<String, Value>) -> Result<Box<dyn Step>, StepError> {
    Ok(Box::new(ManifestStep::from_settings(settings)?))
}
