//! Constantes del motor core.
//!
//! `ENGINE_VERSION` participa en el fingerprint de cada punto completado:
//! cambiarla invalida los fingerprints previos aunque la definición y los
//! artifacts no cambien.

/// Versión lógica del motor de barridos.
pub const ENGINE_VERSION: &str = "S1.0";

/// Subdirectorio (bajo la raíz del barrido) de los steps `for_all`.
pub const SWEEP_SCOPE_DIR: &str = "_sweep";

/// Tamaño mínimo por defecto para considerar completo un artifact.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 1;
