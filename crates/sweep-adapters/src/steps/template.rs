//! Step `template`: genera un archivo de parámetros (p. ej. una tarjeta
//! SLHA) sustituyendo marcadores `.NAME.` por los valores del punto.
//!
//! Ajustes:
//! - `template` (obligatorio): ruta a la plantilla;
//! - `output`: nombre del archivo generado (`param_card.slha`);
//! - `derived`: `NAME → fórmula` evaluada contra el punto; sus marcadores
//!   se sustituyen igual que los parámetros;
//! - `results_dir` / `extension`: copia publicada (`slha_results`, `.slha`);
//! - `skip_if_done` (por defecto `true`).
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use sweep_core::{PointContext, Step, StepArtifact, StepError};
use sweep_domain::{evaluate, ResolvedValue, WorkflowConfig};

use crate::process::{discard, publish};
use crate::settings::{default_true, format_scientific, parse};

pub const NAME: &str = "template";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateParams {
    name: Option<String>,
    template: PathBuf,
    #[serde(default = "default_output")]
    output: String,
    #[serde(default)]
    derived: Map<String, Value>,
    #[serde(default = "default_results_dir")]
    results_dir: Option<String>,
    #[serde(default = "default_extension")]
    extension: String,
    #[serde(default = "default_true")]
    skip_if_done: bool,
}

fn default_output() -> String {
    "param_card.slha".to_string()
}

fn default_results_dir() -> Option<String> {
    Some("slha_results".to_string())
}

fn default_extension() -> String {
    ".slha".to_string()
}

#[derive(Debug)]
pub struct TemplateStep {
    name: String,
    params: TemplateParams,
}

impl TemplateStep {
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, StepError> {
        let params: TemplateParams = parse(NAME, settings)?;
        let name = params.name.clone().unwrap_or_else(|| NAME.to_string());
        if params.output.is_empty() || params.output.contains('/') {
            return Err(StepError::configuration(&name, "'output' must be a plain file name"));
        }
        Ok(Self { name, params })
    }

    /// Pares marcador → texto para el punto del contexto.
    fn substitutions(&self, ctx: &PointContext) -> Result<Vec<(String, String)>, StepError> {
        let point = ctx.point();
        let mut subs: Vec<(String, String)> = point.iter()
                                                   .map(|(k, v)| (format!(".{k}."), format_scientific(v.as_f64())))
                                                   .collect();
        for (key, formula) in &self.params.derived {
            let text = match evaluate(formula, point) {
                ResolvedValue::Number(n) => format_scientific(n),
                ResolvedValue::Text(t) => {
                    log::warn!("[{}] derived '{key}' = '{t}' did not evaluate; inserted verbatim", self.name);
                    t
                }
                ResolvedValue::Unsupported(v) => {
                    return Err(StepError::configuration(&self.name, format!("derived '{key}' has unsupported value {v}")))
                }
            };
            subs.push((format!(".{key}."), text));
        }
        Ok(subs)
    }
}

impl Step for TemplateStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn skip_if_done(&self) -> bool {
        self.params.skip_if_done
    }

    fn output(&self, ctx: &PointContext) -> StepArtifact {
        StepArtifact::new(ctx.step_dir(&self.name).join(&self.params.output))
    }

    fn execute(&self,
               _config: &WorkflowConfig,
               ctx: &PointContext,
               _previous: Option<&StepArtifact>)
               -> Result<StepArtifact, StepError> {
        let template = fs::read_to_string(&self.params.template).map_err(|e| {
                           StepError::configuration(&self.name,
                                                    format!("cannot read template {}: {e}", self.params.template.display()))
                       })?;

        let subs = self.substitutions(ctx)?;
        let rendered: String = template.lines()
                                       .map(|line| {
                                           subs.iter()
                                               .fold(line.to_string(), |acc, (marker, value)| acc.replace(marker, value))
                                       })
                                       .collect::<Vec<_>>()
                                       .join("\n");

        let step_dir = ctx.step_dir(&self.name);
        fs::create_dir_all(&step_dir).map_err(|e| StepError::io(&self.name, &step_dir, e))?;
        let artifact = self.output(ctx);
        let mut body = rendered;
        if template.ends_with('\n') {
            body.push('\n');
        }
        let written = fs::write(artifact.path(), body).map_err(|e| StepError::io(&self.name, artifact.path(), e))
                                                      .and_then(|()| {
                                                          log::info!("[{}] generated {}", self.name, artifact);
                                                          match &self.params.results_dir {
                                                              Some(results) => publish(&self.name,
                                                                                       artifact.path(),
                                                                                       &ctx.published(results, &self.params.extension)),
                                                              None => Ok(()),
                                                          }
                                                      });
        if let Err(err) = written {
            discard(&self.name, artifact.path());
            return Err(err);
        }
        Ok(artifact)
    }
}

pub fn factory(settings: &Map<String, Value>) -> Result<Box<dyn Step>, StepError> {
    Ok(Box::new(TemplateStep::from_settings(settings)?))
}
