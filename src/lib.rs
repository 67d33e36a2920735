//! sweepflow
//!
//! Orquestación de barridos de parámetros: expande un espacio declarado en
//! puntos, ejecuta sobre cada uno una cadena de steps (generación de la
//! tarjeta de parámetros, binarios externos, análisis) con reanudación y
//! publica los resultados por punto.
//!
//! Este crate reúne los crates del workspace:
//! - `domain`: espacio de parámetros, nombres de job, fórmulas, config.
//! - `engine`: contrato de step, registro, runner y driver paralelo.
//! - `adapters`: steps built-in (`template`, `command`, `manifest`).
use std::path::Path;

pub use sweep_adapters as adapters;
pub use sweep_core as engine;
pub use sweep_domain as domain;

pub use sweep_adapters::builtin_registry;
pub use sweep_core::{FailurePolicy, SweepDriver, SweepError, SweepOptions, SweepReport};
pub use sweep_domain::WorkflowConfig;

use sweep_core::InMemoryEventStore;

/// Lee `path`, resuelve el workflow contra los steps built-in y ejecuta el
/// barrido. Los fallos de puntos no son `Err`: quedan en el reporte; un
/// archivo ilegible o inválido es `SweepError::Configuration`.
pub fn run_file(path: impl AsRef<Path>, options: SweepOptions) -> Result<SweepReport, SweepError> {
    let driver = SweepDriver::from_path(&builtin_registry(), path, InMemoryEventStore::new())?.with_options(options);
    let report = driver.run()?;
    log::info!("run {}: {} done, {} failed, {} cancelled",
               report.run_id,
               report.done(),
               report.failed(),
               report.cancelled());
    Ok(report)
}
