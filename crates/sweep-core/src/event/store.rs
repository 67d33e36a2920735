use chrono::Utc;
use dashmap::DashMap;

use super::{PointEvent, PointEventKind};

/// Almacenamiento de eventos append-only, compartido entre workers.
pub trait EventStore: Send + Sync {
    /// Agrega un evento y devuelve el evento completo (con seq y ts).
    fn append_kind(&self, job_name: &str, kind: PointEventKind) -> PointEvent;
    /// Eventos de un punto en orden de seq.
    fn list(&self, job_name: &str) -> Vec<PointEvent>;
}

/// Store en memoria; una entrada por job, sin lock global.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<String, Vec<PointEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, job_name: &str, kind: PointEventKind) -> PointEvent {
        let mut events = self.inner.entry(job_name.to_string()).or_default();
        let ev = PointEvent { seq: events.len() as u64,
                              job_name: job_name.to_string(),
                              kind,
                              ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, job_name: &str) -> Vec<PointEvent> {
        self.inner.get(job_name).map(|e| e.value().clone()).unwrap_or_default()
    }
}

impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    fn append_kind(&self, job_name: &str, kind: PointEventKind) -> PointEvent {
        (**self).append_kind(job_name, kind)
    }

    fn list(&self, job_name: &str) -> Vec<PointEvent> {
        (**self).list(job_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_per_job() {
        let store = InMemoryEventStore::new();
        store.append_kind("a", PointEventKind::StepStarted { step_index: 0, step: "s".into() });
        store.append_kind("b", PointEventKind::StepStarted { step_index: 0, step: "s".into() });
        let ev = store.append_kind("a", PointEventKind::PointCompleted { fingerprint: "f".into() });
        assert_eq!(ev.seq, 1);
        assert_eq!(store.list("a").len(), 2);
        assert_eq!(store.list("b")[0].seq, 0);
        assert!(store.list("zzz").is_empty());
    }
}
