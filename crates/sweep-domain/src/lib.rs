//! Dominio del barrido de parámetros: espacio, puntos, nombres de job,
//! fórmulas y configuración. Sin efectos salvo la lectura de la config.
pub mod config;
pub mod error;
pub mod expansion;
pub mod formula;
pub mod naming;
pub mod parameter;
pub mod scalar;

pub use config::{WorkflowConfig, DEFAULT_WORKDIR};
pub use error::DomainError;
pub use expansion::{expand, Expansion};
pub use formula::{evaluate, resolve, Formula, FormulaError, ResolvedValue};
pub use naming::{encode_scalar, job_name, JobName};
pub use parameter::{ParameterPoint, ParameterSpace, ParameterSpec};
pub use scalar::Scalar;
