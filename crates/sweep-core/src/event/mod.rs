//! Definiciones de eventos y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{PointEvent, PointEventKind};
