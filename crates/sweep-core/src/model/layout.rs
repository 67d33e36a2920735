use std::path::{Path, PathBuf};
use sweep_domain::JobName;

use crate::constants::SWEEP_SCOPE_DIR;

/// Disposición de directorios de un barrido.
///
/// ```text
/// root/<job>/<step>/...          directorio de trabajo de cada step
/// root/<results>/<job><ext>      copia publicada de un resultado
/// root/_sweep/<step>/...         steps for_all
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLayout {
    root: PathBuf,
}

impl SweepLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn point_dir(&self, job: &JobName) -> PathBuf {
        self.root.join(job.as_str())
    }

    pub fn step_dir(&self, job: &JobName, step: &str) -> PathBuf {
        self.point_dir(job).join(step)
    }

    pub fn results_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// `root/<results>/<job><ext>`; `ext` incluye el punto (`.root`).
    pub fn published(&self, results: &str, job: &JobName, ext: &str) -> PathBuf {
        self.results_dir(results).join(format!("{job}{ext}"))
    }

    pub fn sweep_dir(&self) -> PathBuf {
        self.root.join(SWEEP_SCOPE_DIR)
    }
}
