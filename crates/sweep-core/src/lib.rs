//! sweep-core: motor de orquestación del barrido.
//!
//! Contrato de step, registro, runner por punto (encadenamiento y
//! reanudación) y driver paralelo con políticas de fallo y reintento.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod registry;
pub mod step;

pub use engine::{FailurePolicy, PipelineRunner, PointReport, PointState, PointSummary, SweepDriver, SweepOptions,
                 SweepReport};
pub use errors::{ErrorKind, PipelineError, RegistryError, StepError, SweepError};
pub use event::{EventStore, InMemoryEventStore, PointEvent, PointEventKind};
pub use model::{ArtifactStore, FsArtifactStore, PointContext, Scope, StepArtifact, SweepLayout};
pub use registry::{StepEntry, StepFactory, StepRegistry, USES_KEY};
pub use step::{ExecutionMode, Step};
