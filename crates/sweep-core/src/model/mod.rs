//! Modelos neutrales (StepArtifact, PointContext, SweepLayout, ArtifactStore).

pub mod artifact;
pub mod context;
pub mod layout;
pub mod store;

pub use artifact::StepArtifact;
pub use context::{PointContext, Scope};
pub use layout::SweepLayout;
pub use store::{ArtifactStore, FsArtifactStore};
