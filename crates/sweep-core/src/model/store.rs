//! Comprobación de completitud de artifacts.
//!
//! `Step::is_done` no sondea el filesystem directamente: pregunta al
//! `ArtifactStore` del contexto, lo que permite sustituirlo en tests o por
//! otros backends.
use std::fs;

use super::StepArtifact;

pub trait ArtifactStore: Send + Sync + std::fmt::Debug {
    /// `true` si el artifact existe y supera su umbral de tamaño. Sin efectos.
    fn is_complete(&self, artifact: &StepArtifact) -> bool;
}

/// Implementación sobre el filesystem local.
///
/// - archivo: completo si `len >= max(artifact.min_bytes, self.min_bytes)`;
/// - directorio: completo si contiene al menos una entrada.
#[derive(Debug, Clone, Default)]
pub struct FsArtifactStore {
    min_bytes: u64,
}

impl FsArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Umbral global adicional al de cada artifact.
    pub fn with_min_bytes(min_bytes: u64) -> Self {
        Self { min_bytes }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn is_complete(&self, artifact: &StepArtifact) -> bool {
        let path = artifact.path();
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len() >= artifact.min_bytes().max(self.min_bytes),
            Ok(meta) if meta.is_dir() => fs::read_dir(path).map(|mut it| it.next().is_some()).unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_missing_files_are_not_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new();
        let file = dir.path().join("out.lhe");

        assert!(!store.is_complete(&StepArtifact::new(&file)));
        fs::write(&file, b"").unwrap();
        assert!(!store.is_complete(&StepArtifact::new(&file)));
        fs::write(&file, b"events").unwrap();
        assert!(store.is_complete(&StepArtifact::new(&file)));
        assert!(!store.is_complete(&StepArtifact::new(&file).with_min_bytes(1025)));
        assert!(!FsArtifactStore::with_min_bytes(100).is_complete(&StepArtifact::new(&file)));
    }

    #[test]
    fn directories_need_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new();
        assert!(!store.is_complete(&StepArtifact::new(dir.path())));
        fs::write(dir.path().join("x"), b"1").unwrap();
        assert!(store.is_complete(&StepArtifact::new(dir.path())));
    }
}
