//! sweep-adapters: steps concretos sobre el motor.
//!
//! - `template`: genera la tarjeta de parámetros de cada punto.
//! - `command`: envuelve un binario externo (MadGraph, Delphes, CutLang...).
//!   Varias entradas del workflow pueden compartirlo vía `uses`.
//! - `manifest`: índice `for_all` del barrido.
use once_cell::sync::Lazy;
use sweep_core::{StepEntry, StepRegistry};

pub mod process;
pub mod settings;
pub mod steps;

/// Tabla de steps built-in, en el orden en que se registran.
pub static BUILTIN_STEPS: [StepEntry; 3] = [StepEntry::new(steps::template::NAME, steps::template::factory),
                                            StepEntry::new(steps::command::NAME, steps::command::factory),
                                            StepEntry::new(steps::manifest::NAME, steps::manifest::factory)];

// Se construye una sola vez; las copias comparten los punteros de fábrica.
static BUILTIN_REGISTRY: Lazy<StepRegistry> = Lazy::new(|| {
    StepRegistry::discover(&BUILTIN_STEPS).unwrap_or_else(|e| {
                                              log::error!("built-in step table is inconsistent: {e}");
                                              StepRegistry::new()
                                          })
});

/// Registro con los steps built-in. El llamador puede añadir los suyos con
/// `register` sobre la copia devuelta.
pub fn builtin_registry() -> StepRegistry {
    BUILTIN_REGISTRY.clone()
}
