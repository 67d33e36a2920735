//! SweepDriver: expande el barrido y ejecuta los puntos en paralelo.
//!
//! Los puntos corren en un pool de rayon; los steps de un punto son
//! secuenciales. Las políticas de fallo y reintento viven aquí, fuera del
//! contrato de step y del runner.
use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sweep_domain::{JobName, ParameterPoint, WorkflowConfig};
use uuid::Uuid;

use super::report::{PointReport, PointState, SweepReport};
use super::runner::PipelineRunner;
use crate::errors::SweepError;
use crate::event::{EventStore, InMemoryEventStore, PointEventKind};
use crate::model::{ArtifactStore, FsArtifactStore, PointContext, SweepLayout};
use crate::registry::StepRegistry;
use crate::step::ExecutionMode;

/// Qué hacer con el resto del barrido cuando un punto falla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Registrar el fallo y seguir con los demás puntos.
    #[default]
    Continue,
    /// Los puntos aún no iniciados se reportan `Cancelled`; los que están en
    /// curso terminan su cadena.
    StopOnError,
}

#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Hilos del pool; `None` usa los núcleos disponibles.
    pub parallelism: Option<usize>,
    pub policy: FailurePolicy,
    /// Reintentos adicionales por punto ante errores de ejecución.
    pub retries: u32,
}

#[derive(Debug)]
pub struct SweepDriver<E = InMemoryEventStore>
    where E: EventStore
{
    config: WorkflowConfig,
    runner: PipelineRunner<E>,
    layout: SweepLayout,
    store: Arc<dyn ArtifactStore>,
    options: SweepOptions,
}

impl<E> SweepDriver<E> where E: EventStore
{
    pub fn new(registry: &StepRegistry, config: WorkflowConfig, events: E) -> Result<Self, SweepError> {
        let runner = PipelineRunner::new(registry, &config, events)?;
        Ok(Self::from_runner(config, runner))
    }

    /// Lee la configuración JSON de `path` y resuelve el workflow. Un archivo
    /// ilegible o inválido es `SweepError::Configuration`.
    pub fn from_path(registry: &StepRegistry, path: impl AsRef<Path>, events: E) -> Result<Self, SweepError> {
        let config = WorkflowConfig::from_path(path.as_ref())?;
        log::info!("loaded sweep '{}' from {}", config.topology, path.as_ref().display());
        Self::new(registry, config, events)
    }

    pub fn from_runner(config: WorkflowConfig, runner: PipelineRunner<E>) -> Self {
        Self { layout: SweepLayout::new(&config.workdir),
               config,
               runner,
               store: Arc::new(FsArtifactStore::new()),
               options: SweepOptions::default() }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn runner(&self) -> &PipelineRunner<E> {
        &self.runner
    }

    pub fn layout(&self) -> &SweepLayout {
        &self.layout
    }

    /// Puntos del barrido con su nombre, en orden. Falla si dos puntos
    /// comparten nombre.
    pub fn plan(&self) -> Result<Vec<(JobName, ParameterPoint)>, SweepError> {
        let mut seen = HashSet::new();
        let mut plan = Vec::new();
        for point in self.config.points() {
            let job = self.config.job_name(&point);
            if !seen.insert(job.clone()) {
                return Err(SweepError::DuplicateJobName(job.to_string()));
            }
            plan.push((job, point));
        }
        Ok(plan)
    }

    pub fn run(&self) -> Result<SweepReport, SweepError> {
        let started_at = Utc::now();
        let plan = self.plan()?;
        if plan.is_empty() {
            log::warn!("sweep has no points");
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.options.parallelism {
            builder = builder.num_threads(n.max(1));
        }
        let pool = builder.build().map_err(|e| SweepError::ThreadPool(e.to_string()))?;

        log::info!("sweep '{}': {} points, workflow [{}], {} threads",
                   self.config.topology,
                   plan.len(),
                   self.runner.step_names().join(", "),
                   pool.current_num_threads());

        let stop = AtomicBool::new(false);
        let points: Vec<PointReport> = pool.install(|| {
                                               plan.par_iter()
                                                   .map(|(job, point)| self.run_point(job, point, &stop))
                                                   .collect()
                                           });

        let sweep = self.run_for_all(&points, &stop);

        let report = SweepReport { run_id: Uuid::new_v4(),
                                   started_at,
                                   finished_at: Utc::now(),
                                   definition_hash: self.runner.definition_hash().to_string(),
                                   points,
                                   sweep };
        log::info!("sweep finished: {} done, {} failed, {} cancelled",
                   report.done(),
                   report.failed(),
                   report.cancelled());
        Ok(report)
    }

    fn run_point(&self, job: &JobName, point: &ParameterPoint, stop: &AtomicBool) -> PointReport {
        if stop.load(Ordering::SeqCst) {
            log::warn!("[{job}] cancelled: sweep stopped after a failure");
            return PointReport::cancelled(job.clone());
        }
        let ctx = PointContext::for_point(self.layout.clone(), self.store.clone(), job.clone(), point.clone());
        let effective = self.config.for_point(point);
        self.run_with_retries(&effective, &ctx, ExecutionMode::ForEach, stop)
    }

    /// La cadena `for_all` corre una vez, sobre los puntos terminados, salvo
    /// que el barrido se haya detenido o ningún punto haya terminado.
    fn run_for_all(&self, points: &[PointReport], stop: &AtomicBool) -> Option<PointReport> {
        if !self.runner.has_for_all() || stop.load(Ordering::SeqCst) {
            return None;
        }
        let members: Vec<JobName> = points.iter().filter(|p| p.state.is_done()).map(|p| p.job_name.clone()).collect();
        if members.is_empty() {
            log::warn!("no point finished; skipping for_all steps");
            return None;
        }
        let ctx = PointContext::for_sweep(self.layout.clone(), self.store.clone(), members);
        Some(self.run_with_retries(&self.config, &ctx, ExecutionMode::ForAll, stop))
    }

    fn run_with_retries(&self,
                        config: &WorkflowConfig,
                        ctx: &PointContext,
                        mode: ExecutionMode,
                        stop: &AtomicBool)
                        -> PointReport {
        let job = ctx.job_name().to_string();
        let mut attempt = 1;
        loop {
            let mut report = match mode {
                ExecutionMode::ForEach => self.runner.run_point(config, ctx),
                ExecutionMode::ForAll => self.runner.run_sweep(config, ctx),
            };
            report.attempts = attempt;

            if report.is_retryable_failure() && attempt <= self.options.retries && !stop.load(Ordering::SeqCst) {
                attempt += 1;
                let reason = match &report.state {
                    PointState::Failed { cause, .. } => cause.to_string(),
                    other => other.label().to_string(),
                };
                log::warn!("[{job}] execution failed, retrying (attempt {attempt} of {})", self.options.retries + 1);
                self.runner
                    .events()
                    .append_kind(&job, PointEventKind::RetryScheduled { attempt, reason });
                continue;
            }

            if report.state.is_failed() && self.options.policy == FailurePolicy::StopOnError {
                stop.store(true, Ordering::SeqCst);
            }
            return report;
        }
    }
}
