//! Tipos de evento por punto y estructura `PointEvent`.
//!
//! El runner emite un evento por transición observable de la cadena de un
//! punto; el log resultante permite auditar qué se ejecutó, qué se saltó por
//! estar hecho y dónde falló cada punto.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointEventKind {
    /// Inicio (o reinicio tras reintento) de la cadena del punto.
    PointStarted { definition_hash: String, step_count: usize },
    StepStarted { step_index: usize, step: String },
    /// El artifact ya estaba completo; `execute` no se llamó.
    StepSkipped { step_index: usize, step: String, artifact: PathBuf },
    StepFinished { step_index: usize, step: String, artifact: PathBuf },
    /// Fallo terminal de la cadena en este intento.
    StepFailed {
        step_index: usize,
        step: String,
        kind: ErrorKind,
        message: String,
    },
    /// El driver volverá a lanzar la cadena; `attempt` empieza en 2.
    RetryScheduled { attempt: u32, reason: String },
    /// Cierre con fingerprint agregado (versión, definición, job, artifacts).
    PointCompleted { fingerprint: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointEvent {
    pub seq: u64,
    pub job_name: String,
    pub kind: PointEventKind,
    pub ts: DateTime<Utc>,
}
