//! Step `command`: envuelve un binario externo (generador de eventos,
//! simulación de detector, análisis).
//!
//! Ajustes:
//! - `program` o `program_env` (variable de entorno con la ruta, p. ej.
//!   `MG5_EXEC`);
//! - `args`: lista de argumentos con marcadores (ver abajo);
//! - `output` (obligatorio): archivo producido, relativo al directorio del
//!   step; admite `{job_name}`;
//! - `requires_input`: exige un `previous` completo;
//! - `min_bytes`: umbral de completitud del output (por defecto 1);
//! - `results_dir` / `extension`: copia publicada `<results>/<job><ext>`;
//! - `vars`: `NAME → fórmula`, accesibles como `{var:NAME}`;
//! - `env`: variables de entorno adicionales (con marcadores);
//! - `log`: archivo de log, relativo al directorio del punto
//!   (`<name>_full.log`);
//! - `skip_if_done` (por defecto `true`).
//!
//! Marcadores: `{input}`, `{output}`, `{step_dir}`, `{point_dir}`,
//! `{sweep_root}`, `{job_name}`, `{param:NAME}`, `{var:NAME}`.
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use sweep_core::{PointContext, Step, StepArtifact, StepError};
use sweep_domain::{evaluate, ResolvedValue, WorkflowConfig};

use crate::process::{discard, publish, Invocation};
use crate::settings::{default_true, format_plain, parse};

pub const NAME: &str = "command";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandParams {
    name: Option<String>,
    program: Option<PathBuf>,
    program_env: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    output: String,
    #[serde(default)]
    requires_input: bool,
    #[serde(default = "default_min_bytes")]
    min_bytes: u64,
    results_dir: Option<String>,
    extension: Option<String>,
    #[serde(default)]
    vars: Map<String, Value>,
    #[serde(default)]
    env: Map<String, Value>,
    log: Option<String>,
    #[serde(default = "default_true")]
    skip_if_done: bool,
}

fn default_min_bytes() -> u64 {
    1
}

#[derive(Debug)]
pub struct CommandStep {
    name: String,
    params: CommandParams,
}

/// Valores disponibles al expandir marcadores.
struct Placeholders<'a> {
    step: &'a str,
    ctx: &'a PointContext,
    input: Option<&'a Path>,
    output: &'a Path,
    step_dir: &'a Path,
    vars: &'a Map<String, Value>,
}

impl Placeholders<'_> {
    fn lookup(&self, key: &str) -> Result<String, StepError> {
        let text = |p: &Path| p.to_string_lossy().into_owned();
        match key {
            "input" => self.input
                           .map(text)
                           .ok_or_else(|| StepError::input(self.step, "'{input}' used but there is no previous artifact")),
            "output" => Ok(text(self.output)),
            "step_dir" => Ok(text(self.step_dir)),
            "point_dir" => Ok(text(&self.ctx.point_dir())),
            "sweep_root" => Ok(text(self.ctx.sweep_root())),
            "job_name" => Ok(self.ctx.job_name().to_string()),
            _ => {
                if let Some(name) = key.strip_prefix("param:") {
                    return self.ctx
                               .point()
                               .get(name)
                               .map(|v| v.to_string())
                               .ok_or_else(|| StepError::configuration(self.step, format!("unknown parameter '{name}'")));
                }
                if let Some(name) = key.strip_prefix("var:") {
                    let formula = self.vars
                                      .get(name)
                                      .ok_or_else(|| StepError::configuration(self.step, format!("unknown var '{name}'")))?;
                    return match evaluate(formula, self.ctx.point()) {
                        ResolvedValue::Number(n) => Ok(format_plain(n)),
                        ResolvedValue::Text(t) => {
                            log::warn!("[{}] var '{name}' = '{t}' did not evaluate; passed verbatim", self.step);
                            Ok(t)
                        }
                        ResolvedValue::Unsupported(v) => {
                            Err(StepError::configuration(self.step, format!("var '{name}' has unsupported value {v}")))
                        }
                    };
                }
                Err(StepError::configuration(self.step, format!("unknown placeholder '{{{key}}}'")))
            }
        }
    }

    /// Expande `{...}` en `template`; `{{` y `}}` escapan llaves.
    fn expand(&self, template: &str) -> Result<String, StepError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                return Err(StepError::configuration(self.step, format!("unbalanced '}}' in '{template}'")));
            }
            let end = tail.find('}')
                          .ok_or_else(|| StepError::configuration(self.step, format!("unclosed '{{' in '{template}'")))?;
            out.push_str(&self.lookup(&tail[1..end])?);
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl CommandStep {
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, StepError> {
        let params: CommandParams = parse(NAME, settings)?;
        let name = params.name.clone().unwrap_or_else(|| NAME.to_string());
        match (&params.program, &params.program_env) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => return Err(StepError::configuration(&name, "exactly one of 'program' or 'program_env' is required")),
        }
        if params.output.is_empty() {
            return Err(StepError::configuration(&name, "'output' must not be empty"));
        }
        Ok(Self { name, params })
    }

    fn program(&self) -> Result<PathBuf, StepError> {
        if let Some(p) = &self.params.program {
            return Ok(p.clone());
        }
        let var = self.params.program_env.as_deref().unwrap_or_default();
        std::env::var_os(var).map(PathBuf::from)
                             .ok_or_else(|| StepError::configuration(&self.name, format!("environment variable {var} is not set")))
    }

    fn log_path(&self, ctx: &PointContext) -> PathBuf {
        let file = self.params.log.clone().unwrap_or_else(|| format!("{}_full.log", self.name));
        ctx.point_dir().join(file)
    }

    fn check_input(&self, ctx: &PointContext, previous: Option<&StepArtifact>) -> Result<(), StepError> {
        if !self.params.requires_input {
            return Ok(());
        }
        match previous {
            None => Err(StepError::input(&self.name, "requires the previous step's artifact, got none")),
            Some(p) if !ctx.store().is_complete(p) => {
                Err(StepError::input(&self.name, format!("previous artifact {p} is missing or incomplete")))
            }
            Some(_) => Ok(()),
        }
    }
}

impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn skip_if_done(&self) -> bool {
        self.params.skip_if_done
    }

    fn output(&self, ctx: &PointContext) -> StepArtifact {
        let file = self.params.output.replace("{job_name}", ctx.job_name().as_str());
        StepArtifact::new(ctx.step_dir(&self.name).join(file)).with_min_bytes(self.params.min_bytes)
    }

    fn execute(&self,
               _config: &WorkflowConfig,
               ctx: &PointContext,
               previous: Option<&StepArtifact>)
               -> Result<StepArtifact, StepError> {
        self.check_input(ctx, previous)?;
        let program = self.program()?;

        let step_dir = ctx.step_dir(&self.name);
        fs::create_dir_all(&step_dir).map_err(|e| StepError::io(&self.name, &step_dir, e))?;
        let artifact = self.output(ctx);

        let placeholders = Placeholders { step: &self.name,
                                          ctx,
                                          input: previous.map(StepArtifact::path),
                                          output: artifact.path(),
                                          step_dir: &step_dir,
                                          vars: &self.params.vars };
        let args = self.params
                       .args
                       .iter()
                       .map(|a| placeholders.expand(a))
                       .collect::<Result<Vec<_>, _>>()?;
        let mut env = Vec::with_capacity(self.params.env.len());
        for (key, value) in &self.params.env {
            let raw = match value {
                Value::String(s) => placeholders.expand(s)?,
                other => other.to_string(),
            };
            env.push((key.clone(), raw));
        }

        let invocation = Invocation { program,
                                      args,
                                      cwd: step_dir,
                                      env,
                                      log: self.log_path(ctx) };
        if let Err(err) = self.produce(ctx, &invocation, &artifact) {
            discard(&self.name, artifact.path());
            return Err(err);
        }
        Ok(artifact)
    }
}

impl CommandStep {
    /// Lanza el proceso, verifica el output y lo publica. Si algo falla el
    /// llamador descarta el artifact: un output escrito por un proceso que
    /// terminó mal no debe contar como hecho.
    fn produce(&self, ctx: &PointContext, invocation: &Invocation, artifact: &StepArtifact) -> Result<(), StepError> {
        invocation.run(&self.name)?;

        if !ctx.store().is_complete(artifact) {
            return Err(StepError::execution(&self.name,
                                            format!("process succeeded but {artifact} is missing or smaller than {} bytes",
                                                    artifact.min_bytes())));
        }

        if let Some(results) = &self.params.results_dir {
            let ext = self.params.extension.clone().unwrap_or_else(|| {
                                                        artifact.path()
                                                                .extension()
                                                                .map(|e| format!(".{}", e.to_string_lossy()))
                                                                .unwrap_or_default()
                                                    });
            publish(&self.name, artifact.path(), &ctx.published(results, &ext))?;
        }
        Ok(())
    }
}

pub fn factory(settings: &Map<String, Value>) -> Result<Box<dyn Step>, StepError> {
    Ok(Box::new(CommandStep::from_settings(settings)?))
}
