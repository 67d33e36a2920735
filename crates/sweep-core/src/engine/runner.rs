//! Core PipelineRunner implementation
//!
//! Ejecuta la cadena de steps de un punto: cada artifact devuelto se pasa
//! como `previous` al siguiente step; el primero recibe `None`. Ante un
//! fallo la cadena se detiene sin rollback, y en la siguiente entrada los
//! steps ya completos se saltan (reanudación a mitad de cadena).
use serde_json::{json, Value};
use sweep_domain::WorkflowConfig;

use super::report::{PointReport, PointState};
use crate::constants::ENGINE_VERSION;
use crate::errors::RegistryError;
use crate::event::{EventStore, InMemoryEventStore, PointEventKind};
use crate::hashing::hash_value;
use crate::model::{PointContext, StepArtifact};
use crate::registry::StepRegistry;
use crate::step::{ExecutionMode, Step};

#[derive(Debug)]
struct ResolvedStep {
    /// Posición en el workflow configurado.
    index: usize,
    /// Clave de registro; es el nombre que aparece en eventos y errores.
    key: String,
    step: Box<dyn Step>,
}

/// Cadena de steps resuelta una sola vez y compartida por referencia entre
/// workers. No mantiene estado por punto.
#[derive(Debug)]
pub struct PipelineRunner<E = InMemoryEventStore>
    where E: EventStore
{
    steps: Vec<ResolvedStep>,
    definition_hash: String,
    events: E,
}

impl<E> PipelineRunner<E> where E: EventStore
{
    /// Resuelve el `workflow` de `config` contra el registro. Cualquier error
    /// de resolución ocurre aquí, antes de ejecutar nada.
    pub fn new(registry: &StepRegistry, config: &WorkflowConfig, events: E) -> Result<Self, RegistryError> {
        let mut steps = Vec::with_capacity(config.workflow.len());
        let mut definition = Vec::with_capacity(config.workflow.len());
        for (index, name) in config.workflow.iter().enumerate() {
            let settings = config.step_settings(name).cloned().unwrap_or(Value::Null);
            let step = registry.resolve(name, &settings)?;
            let key = name.to_lowercase();
            definition.push(json!({"step": key, "mode": step.execution_mode(), "settings": settings}));
            steps.push(ResolvedStep { index, key, step });
        }
        let definition_hash = hash_value(&json!({"engine_version": ENGINE_VERSION, "steps": definition}));
        log::debug!("pipeline resolved: {} steps, definition {}", steps.len(), definition_hash);
        Ok(Self { steps,
                  definition_hash,
                  events })
    }

    /// Cadena a partir de instancias ya construidas; la clave es `name()`.
    pub fn from_steps(steps: Vec<Box<dyn Step>>, events: E) -> Self {
        let steps: Vec<ResolvedStep> = steps.into_iter()
                                            .enumerate()
                                            .map(|(index, step)| ResolvedStep { index,
                                                                                key: step.name().to_lowercase(),
                                                                                step })
                                            .collect();
        let definition: Vec<Value> = steps.iter()
                                          .map(|s| json!({"step": s.key, "mode": s.step.execution_mode()}))
                                          .collect();
        let definition_hash = hash_value(&json!({"engine_version": ENGINE_VERSION, "steps": definition}));
        Self { steps,
               definition_hash,
               events }
    }

    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    /// Claves de los steps en orden del workflow.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn has_for_all(&self) -> bool {
        self.steps.iter().any(|s| s.step.execution_mode() == ExecutionMode::ForAll)
    }

    /// Cadena `for_each` de un punto.
    pub fn run_point(&self, config: &WorkflowConfig, ctx: &PointContext) -> PointReport {
        self.run_chain(config, ctx, ExecutionMode::ForEach)
    }

    /// Cadena `for_all`, con un contexto de alcance `Sweep`.
    pub fn run_sweep(&self, config: &WorkflowConfig, ctx: &PointContext) -> PointReport {
        self.run_chain(config, ctx, ExecutionMode::ForAll)
    }

    fn run_chain(&self, config: &WorkflowConfig, ctx: &PointContext, mode: ExecutionMode) -> PointReport {
        let job = ctx.job_name().to_string();
        let chain: Vec<&ResolvedStep> = self.steps.iter().filter(|s| s.step.execution_mode() == mode).collect();
        let mut report = PointReport::new(ctx.job_name().clone());
        report.attempts = 1;

        self.events.append_kind(&job,
                                PointEventKind::PointStarted { definition_hash: self.definition_hash.clone(),
                                                               step_count: chain.len() });

        let mut previous: Option<StepArtifact> = None;
        for resolved in chain {
            report.state = PointState::Running(resolved.index);
            self.events.append_kind(&job,
                                    PointEventKind::StepStarted { step_index: resolved.index,
                                                                  step: resolved.key.clone() });

            let skipped = resolved.step.skip_if_done() && resolved.step.is_done(ctx);
            match resolved.step.run(config, ctx, previous.as_ref()) {
                Ok(artifact) => {
                    let kind = if skipped {
                        report.skipped.push(resolved.key.clone());
                        PointEventKind::StepSkipped { step_index: resolved.index,
                                                      step: resolved.key.clone(),
                                                      artifact: artifact.path().to_path_buf() }
                    } else {
                        PointEventKind::StepFinished { step_index: resolved.index,
                                                       step: resolved.key.clone(),
                                                       artifact: artifact.path().to_path_buf() }
                    };
                    self.events.append_kind(&job, kind);
                    report.artifacts.push(artifact.clone());
                    previous = Some(artifact);
                }
                Err(cause) => {
                    log::error!("[{job}] step {} ('{}') failed: {cause}", resolved.index, resolved.key);
                    self.events.append_kind(&job,
                                            PointEventKind::StepFailed { step_index: resolved.index,
                                                                         step: resolved.key.clone(),
                                                                         kind: cause.kind(),
                                                                         message: cause.to_string() });
                    report.state = PointState::Failed { step_index: resolved.index,
                                                        step: resolved.key.clone(),
                                                        cause };
                    return report;
                }
            }
        }

        let fingerprint = self.fingerprint(&job, &report.artifacts);
        self.events.append_kind(&job, PointEventKind::PointCompleted { fingerprint: fingerprint.clone() });
        report.fingerprint = Some(fingerprint);
        report.state = PointState::Done(previous);
        report
    }

    fn fingerprint(&self, job: &str, artifacts: &[StepArtifact]) -> String {
        let paths: Vec<String> = artifacts.iter().map(|a| a.path().to_string_lossy().into_owned()).collect();
        hash_value(&json!({
                       "engine_version": ENGINE_VERSION,
                       "definition_hash": self.definition_hash,
                       "job_name": job,
                       "artifacts": paths
                   }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepError;
    use crate::model::{FsArtifactStore, SweepLayout};
    use std::sync::{Arc, Mutex};
    use sweep_domain::JobName;

    /// Step de prueba: registra el `previous` recibido y escribe `<name>.out`.
    #[derive(Debug)]
    struct Recording {
        name: &'static str,
        fail: bool,
        seen: Arc<Mutex<Vec<(String, Option<StepArtifact>)>>>,
    }

    impl Step for Recording {
        fn name(&self) -> &str {
            self.name
        }
        fn output(&self, ctx: &PointContext) -> StepArtifact {
            StepArtifact::new(ctx.step_dir(self.name).join(format!("{}.out", self.name)))
        }
        fn execute(&self,
                   _config: &WorkflowConfig,
                   ctx: &PointContext,
                   previous: Option<&StepArtifact>)
                   -> Result<StepArtifact, StepError> {
            self.seen.lock().unwrap().push((self.name.to_string(), previous.cloned()));
            if self.fail {
                return Err(StepError::execution(self.name, "exit status 1"));
            }
            let out = self.output(ctx);
            std::fs::create_dir_all(ctx.step_dir(self.name)).unwrap();
            std::fs::write(out.path(), self.name).unwrap();
            Ok(out)
        }
    }

    type Seen = Arc<Mutex<Vec<(String, Option<StepArtifact>)>>>;

    fn chain(fail_second: bool) -> (PipelineRunner, Seen) {
        let seen: Seen = Arc::default();
        let steps: Vec<Box<dyn Step>> = vec![Box::new(Recording { name: "s1", fail: false, seen: seen.clone() }),
                                             Box::new(Recording { name: "s2", fail: fail_second, seen: seen.clone() }),
                                             Box::new(Recording { name: "s3", fail: false, seen: seen.clone() }),];
        (PipelineRunner::from_steps(steps, InMemoryEventStore::new()), seen)
    }

    fn context(root: &std::path::Path) -> (WorkflowConfig, PointContext) {
        let config = WorkflowConfig::from_value(&serde_json::json!({
                         "topology": "T", "energy": 13,
                         "parameter_space": {"a": {"value": 1}},
                         "workflow": ["s1", "s2", "s3"]
                     })).unwrap();
        let point = config.points().remove(0);
        let ctx = PointContext::for_point(SweepLayout::new(root),
                                          Arc::new(FsArtifactStore::new()),
                                          JobName::new("T", &point, 13.0),
                                          point);
        (config, ctx)
    }

    #[test]
    fn artifacts_chain_into_next_step() {
        let dir = tempfile::tempdir().unwrap();
        let (config, ctx) = context(dir.path());
        let (runner, seen) = chain(false);

        let report = runner.run_point(&config, &ctx);
        assert!(report.state.is_done());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1, None);
        assert_eq!(seen[1].1.as_ref(), Some(&report.artifacts[0]));
        assert_eq!(seen[2].1.as_ref(), Some(&report.artifacts[1]));
        assert!(report.fingerprint.is_some());
        assert_eq!(report.into_result().unwrap().unwrap().path(), ctx.step_dir("s3").join("s3.out"));
    }

    #[test]
    fn failure_stops_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let (config, ctx) = context(dir.path());
        let (runner, seen) = chain(true);

        let report = runner.run_point(&config, &ctx);
        let names: Vec<String> = seen.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["s1", "s2"], "s3 must never run");

        let events = runner.events().list(ctx.job_name().as_str());
        assert!(events.iter().any(|e| matches!(&e.kind, PointEventKind::StepFailed { step_index: 1, .. })));
        assert!(!events.iter().any(|e| matches!(e.kind, PointEventKind::PointCompleted { .. })));

        let err = report.into_result().unwrap_err();
        assert_eq!(err.step_index, 1);
        assert_eq!(err.step, "s2");
        assert_eq!(err.job_name, ctx.job_name().as_str());
    }

    #[test]
    fn second_run_skips_finished_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (config, ctx) = context(dir.path());
        let (runner, seen) = chain(false);

        let first = runner.run_point(&config, &ctx);
        let second = runner.run_point(&config, &ctx);
        assert_eq!(seen.lock().unwrap().len(), 3, "no step executes twice");
        assert_eq!(second.skipped, vec!["s1", "s2", "s3"]);
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn definition_hash_depends_on_step_order() {
        let (a, _) = chain(false);
        let seen: Seen = Arc::default();
        let b = PipelineRunner::from_steps(vec![Box::new(Recording { name: "s2", fail: false, seen: seen.clone() }),
                                                Box::new(Recording { name: "s1", fail: false, seen })],
                                           InMemoryEventStore::new());
        assert_ne!(a.definition_hash(), b.definition_hash());
        assert_eq!(b.step_names(), vec!["s2", "s1"]);
    }
}
