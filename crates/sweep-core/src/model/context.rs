use std::path::{Path, PathBuf};
use std::sync::Arc;
use sweep_domain::{JobName, ParameterPoint};

use super::{ArtifactStore, SweepLayout};
use crate::constants::SWEEP_SCOPE_DIR;

/// Alcance de una ejecución: un punto o el barrido completo (steps
/// `for_all`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Point,
    /// Puntos terminados que cubre el step `for_all`, en orden del barrido.
    Sweep { members: Vec<JobName> },
}

/// Contexto entregado a cada step: identidad del punto, directorios y
/// store de artifacts.
#[derive(Debug, Clone)]
pub struct PointContext {
    job_name: JobName,
    point: ParameterPoint,
    layout: SweepLayout,
    store: Arc<dyn ArtifactStore>,
    scope: Scope,
}

impl PointContext {
    pub fn for_point(layout: SweepLayout, store: Arc<dyn ArtifactStore>, job_name: JobName, point: ParameterPoint) -> Self {
        Self { job_name,
               point,
               layout,
               store,
               scope: Scope::Point }
    }

    /// Contexto de barrido: el "job" es `_sweep` y el punto está vacío.
    pub fn for_sweep(layout: SweepLayout, store: Arc<dyn ArtifactStore>, members: Vec<JobName>) -> Self {
        Self { job_name: JobName::from(SWEEP_SCOPE_DIR.to_string()),
               point: ParameterPoint::default(),
               layout,
               store,
               scope: Scope::Sweep { members } }
    }

    pub fn job_name(&self) -> &JobName {
        &self.job_name
    }

    pub fn point(&self) -> &ParameterPoint {
        &self.point
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn layout(&self) -> &SweepLayout {
        &self.layout
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    pub fn sweep_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn point_dir(&self) -> PathBuf {
        self.layout.point_dir(&self.job_name)
    }

    /// Directorio propio de `step` para este punto.
    pub fn step_dir(&self, step: &str) -> PathBuf {
        self.layout.step_dir(&self.job_name, step)
    }

    pub fn results_dir(&self, name: &str) -> PathBuf {
        self.layout.results_dir(name)
    }

    /// Ruta publicada del resultado de este punto en `results`.
    pub fn published(&self, results: &str, ext: &str) -> PathBuf {
        self.layout.published(results, &self.job_name, ext)
    }
}
