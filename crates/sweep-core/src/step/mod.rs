//! Definiciones relacionadas a Steps.
//!
//! Un Step envuelve una etapa externa del pipeline (generación de tarjetas,
//! eventos, simulación de detector, análisis). El runner encadena el
//! artifact de cada step como entrada del siguiente.

pub mod definition;

pub use definition::{ExecutionMode, Step};
