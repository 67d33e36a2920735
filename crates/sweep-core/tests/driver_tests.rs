use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sweep_core::{EventStore, ExecutionMode, FailurePolicy, InMemoryEventStore, PipelineRunner, PointContext, PointEventKind, StepRegistry,
                 Scope, Step, StepArtifact, StepError, SweepDriver, SweepError, SweepOptions};
use sweep_domain::{JobName, WorkflowConfig};

fn config(root: &Path, space: serde_json::Value, workflow: &[&str]) -> WorkflowConfig {
    WorkflowConfig::from_value(&json!({
        "topology": "T",
        "energy": 13,
        "parameter_space": space,
        "workflow": workflow,
        "workdir": root.to_string_lossy()
    })).expect("valid config")
}

fn write(ctx: &PointContext, name: &str, artifact: &StepArtifact) -> Result<(), StepError> {
    let dir = ctx.step_dir(name);
    std::fs::create_dir_all(&dir).map_err(|e| StepError::io(name, &dir, e))?;
    std::fs::write(artifact.path(), name).map_err(|e| StepError::io(name, artifact.path(), e))
}

/// Escribe `<name>.out`; falla (con error de ejecución) cuando el parámetro
/// `a` vale `fail_on`, y sólo durante los primeros `failures` intentos de
/// cada punto.
#[derive(Debug)]
struct Scripted {
    name: &'static str,
    fail_on: Option<i64>,
    failures: usize,
    calls: Arc<AtomicUsize>,
    attempts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
        Self { name,
               fail_on: None,
               failures: usize::MAX,
               calls,
               attempts: Mutex::new(Vec::new()) }
    }

    fn failing(mut self, value: i64, failures: usize) -> Self {
        self.fail_on = Some(value);
        self.failures = failures;
        self
    }
}

impl Step for Scripted {
    fn name(&self) -> &str {
        self.name
    }
    fn output(&self, ctx: &PointContext) -> StepArtifact {
        StepArtifact::new(ctx.step_dir(self.name).join(format!("{}.out", self.name)))
    }
    fn execute(&self,
               _config: &WorkflowConfig,
               ctx: &PointContext,
               _previous: Option<&StepArtifact>)
               -> Result<StepArtifact, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let a = ctx.point().get("a").map(|v| v.as_f64() as i64);
        if a.is_some() && a == self.fail_on {
            let mut attempts = self.attempts.lock().unwrap();
            let seen = attempts.iter().filter(|j| *j == ctx.job_name().as_str()).count();
            attempts.push(ctx.job_name().to_string());
            if seen < self.failures {
                return Err(StepError::execution(self.name, "exit status 1"));
            }
        }
        let out = self.output(ctx);
        write(ctx, self.name, &out)?;
        Ok(out)
    }
}

/// Step `for_all`: recuerda los miembros del barrido que recibió.
#[derive(Debug)]
struct Collect {
    calls: Arc<AtomicUsize>,
    members: Arc<Mutex<Vec<JobName>>>,
}

impl Step for Collect {
    fn name(&self) -> &str {
        "collect"
    }
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::ForAll
    }
    fn output(&self, ctx: &PointContext) -> StepArtifact {
        StepArtifact::new(ctx.step_dir("collect").join("index.txt"))
    }
    fn execute(&self, _: &WorkflowConfig, ctx: &PointContext, _: Option<&StepArtifact>) -> Result<StepArtifact, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Scope::Sweep { members } = ctx.scope() {
            self.members.lock().unwrap().extend(members.iter().cloned());
        }
        let out = self.output(ctx);
        write(ctx, "collect", &out)?;
        Ok(out)
    }
}

fn driver(cfg: WorkflowConfig, steps: Vec<Box<dyn Step>>, options: SweepOptions) -> SweepDriver {
    SweepDriver::from_runner(cfg, PipelineRunner::from_steps(steps, InMemoryEventStore::new())).with_options(options)
}

#[test]
fn stop_on_error_cancels_points_not_yet_started() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"min": 1, "max": 4, "step": 1}}), &["s1"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", calls.clone()).failing(1, usize::MAX))];
    let options = SweepOptions { parallelism: Some(1),
                                 policy: FailurePolicy::StopOnError,
                                 retries: 0 };

    let report = driver(cfg, steps, options).run().unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(report.cancelled(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!report.is_success());
    assert!(report.points[1..].iter().all(|p| p.attempts == 0));
}

#[test]
fn continue_policy_runs_every_point() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"min": 1, "max": 4, "step": 1}}), &["s1"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", calls.clone()).failing(2, usize::MAX))];

    let report = driver(cfg, steps, SweepOptions::default()).run().unwrap();
    assert_eq!(report.done(), 3);
    assert_eq!(report.failed(), 1);
    assert!(report.points[1].state.is_failed());
    let summaries = report.summaries();
    assert_eq!(summaries[1].failed_step.as_deref(), Some("s1"));
}

#[test]
fn retries_rerun_only_the_failing_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"value": 7}}), &["s1", "s2"]);
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", first.clone())),
                                         Box::new(Scripted::new("s2", second.clone()).failing(7, 1))];
    let options = SweepOptions { retries: 2,
                                 ..SweepOptions::default() };

    let drv = driver(cfg, steps, options);
    let report = drv.run().unwrap();
    assert!(report.is_success());
    assert_eq!(first.load(Ordering::SeqCst), 1, "finished prefix is skipped on retry");
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(report.points[0].attempts, 2);
    assert_eq!(report.points[0].skipped, vec!["s1"]);

    let events = drv.runner().events().list(report.points[0].job_name.as_str());
    assert!(events.iter().any(|e| matches!(e.kind, PointEventKind::RetryScheduled { attempt: 2, .. })));
}

#[test]
fn input_errors_are_not_retried() {
    #[derive(Debug)]
    struct NeedsInput(Arc<AtomicUsize>);
    impl Step for NeedsInput {
        fn name(&self) -> &str {
            "needs"
        }
        fn output(&self, ctx: &PointContext) -> StepArtifact {
            StepArtifact::new(ctx.step_dir("needs").join("x"))
        }
        fn execute(&self, _: &WorkflowConfig, _: &PointContext, previous: Option<&StepArtifact>) -> Result<StepArtifact, StepError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StepError::input("needs", format!("no previous artifact: {previous:?}")))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({}), &["needs"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let options = SweepOptions { retries: 3,
                                 ..SweepOptions::default() };
    let report = driver(cfg, vec![Box::new(NeedsInput(calls.clone()))], options).run().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.points.len(), 1, "empty space is a single point");
    assert_eq!(report.failed(), 1);
}

#[test]
fn for_all_step_runs_once_after_points() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"min": 1, "max": 3, "step": 1}}), &["s1", "collect"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let members = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", Arc::new(AtomicUsize::new(0)))),
                                         Box::new(Collect { calls: calls.clone(),
                                                            members: members.clone() })];

    let report = driver(cfg, steps, SweepOptions::default()).run().unwrap();
    assert!(report.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let members: HashSet<String> = members.lock().unwrap().iter().map(|j| j.to_string()).collect();
    assert_eq!(members.len(), 3);
    assert!(members.contains("T.1p0.13p0"));

    let sweep = report.sweep.as_ref().expect("for_all report");
    assert!(dir.path().join("_sweep").join("collect").join("index.txt").exists());
    assert_eq!(sweep.artifacts.len(), 1);
    // los puntos no ejecutan el step for_all
    assert!(report.points.iter().all(|p| p.artifacts.len() == 1));
}

#[test]
fn colliding_job_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"min": 10000000000_i64, "max": 10000000001_i64, "step": 1}}), &["s1"]);
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", Arc::new(AtomicUsize::new(0))))];
    let err = driver(cfg, steps, SweepOptions::default()).run().unwrap_err();
    assert!(matches!(err, SweepError::DuplicateJobName(name) if name == "T.1p0e+10.13p0"));
}

#[test]
fn unreadable_or_invalid_config_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StepRegistry::new();
    let missing = SweepDriver::from_path(&registry, dir.path().join("missing.json"), InMemoryEventStore::new());
    assert!(matches!(missing, Err(SweepError::Configuration(_))));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"topology": "T", "energy": 13, "workflow": ["s1"]}"#).unwrap();
    let err = SweepDriver::from_path(&registry, &bad, InMemoryEventStore::new()).unwrap_err();
    assert!(err.to_string().contains("parameter_space"), "{err}");
}

#[test]
fn driver_is_debuggable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), json!({"a": {"value": 1}}), &["s1"]);
    let steps: Vec<Box<dyn Step>> = vec![Box::new(Scripted::new("s1", Arc::new(AtomicUsize::new(0))))];
    let rendered = format!("{:?}", driver(cfg, steps, SweepOptions::default()));
    assert!(rendered.contains("SweepDriver"));
    assert!(rendered.contains("s1"));
}
