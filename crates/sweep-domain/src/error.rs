// error.rs
use thiserror::Error;

use crate::formula::FormulaError;

/// Errores del dominio del barrido (configuración y espacio de parámetros).
///
/// Todas las variantes son errores de configuración: se detectan antes de
/// ejecutar cualquier step y nunca se reintentan.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Entrada del `parameter_space` que no tiene exactamente una de las dos
    /// formas admitidas (`{value}` o `{min, max, step}`).
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("missing required config field '{0}'")]
    MissingField(String),

    #[error("invalid config field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DomainError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        DomainError::InvalidParameter { name: name.to_string(),
                                        reason: reason.into() }
    }

    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        DomainError::InvalidField { field: field.to_string(),
                                    reason: reason.into() }
    }
}
