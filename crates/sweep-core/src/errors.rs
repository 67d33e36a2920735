//! Errores del core: fallos de step, de registro, de la cadena por punto y
//! del barrido completo.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use sweep_domain::DomainError;
use thiserror::Error;

/// Clasificación de un `StepError`. La usa el driver para decidir reintentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Input,
    Execution,
    Io,
}

#[derive(Debug, Error)]
pub enum StepError {
    /// Ajuste ausente o inválido.
    #[error("step '{step}': configuration error: {reason}")]
    Configuration { step: String, reason: String },
    /// El artifact previo requerido falta o está incompleto.
    #[error("step '{step}': input error: {reason}")]
    Input { step: String, reason: String },
    /// El proceso externo terminó con estado != 0 o no pudo lanzarse.
    #[error("step '{step}': execution error: {reason}")]
    Execution { step: String, reason: String },
    /// Fallo de filesystem escribiendo los artifacts propios del step.
    #[error("step '{step}': io error on {}: {source}", path.display())]
    Io {
        step: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StepError {
    pub fn configuration(step: &str, reason: impl Into<String>) -> Self {
        StepError::Configuration { step: step.to_string(),
                                   reason: reason.into() }
    }

    pub fn input(step: &str, reason: impl Into<String>) -> Self {
        StepError::Input { step: step.to_string(),
                           reason: reason.into() }
    }

    pub fn execution(step: &str, reason: impl Into<String>) -> Self {
        StepError::Execution { step: step.to_string(),
                               reason: reason.into() }
    }

    pub fn io(step: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StepError::Io { step: step.to_string(),
                        path: path.into(),
                        source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Configuration { .. } => ErrorKind::Configuration,
            StepError::Input { .. } => ErrorKind::Input,
            StepError::Execution { .. } => ErrorKind::Execution,
            StepError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn step(&self) -> &str {
        match self {
            StepError::Configuration { step, .. }
            | StepError::Input { step, .. }
            | StepError::Execution { step, .. }
            | StepError::Io { step, .. } => step,
        }
    }

    /// Sólo los errores de ejecución externa se reintentan.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Execution
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown step '{name}' (available: {})", available.join(", "))]
    UnknownStep { name: String, available: Vec<String> },
    #[error("invalid configuration for step '{step}': {reason}")]
    InvalidStepConfig { step: String, reason: String },
    #[error("step '{0}' registered more than once")]
    DuplicateStep(String),
    #[error("could not construct step '{step}': {source}")]
    Construction {
        step: String,
        #[source]
        source: StepError,
    },
}

/// Fallo de la cadena de un punto: qué step, en qué posición y por qué.
#[derive(Debug, Error)]
#[error("point '{job_name}' failed at step {step_index} ('{step}'): {cause}")]
pub struct PipelineError {
    pub step_index: usize,
    pub step: String,
    pub job_name: String,
    #[source]
    pub cause: StepError,
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Configuration(#[from] DomainError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("job name '{0}' is produced by more than one point")]
    DuplicateJobName(String),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}
