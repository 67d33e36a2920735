use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_MIN_ARTIFACT_BYTES;

/// Ubicación declarada del resultado de un step; el siguiente step la recibe
/// como `previous`.
///
/// `min_bytes` es el umbral con el que el `ArtifactStore` decide si el
/// artifact está completo (un archivo truncado o vacío no cuenta).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepArtifact {
    path: PathBuf,
    min_bytes: u64,
}

impl StepArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(),
               min_bytes: DEFAULT_MIN_ARTIFACT_BYTES }
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }
}

impl fmt::Display for StepArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
