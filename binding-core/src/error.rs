//! Error types for the binding core

use thiserror::Error;

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of binder initialization that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Log middleware construction
    Log,
    /// Target connector load
    Target,
    /// Middleware construction and chain composition
    Middleware,
    /// Source connector load
    Source,
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStage::Log => write!(f, "log middleware load"),
            InitStage::Target => write!(f, "target load"),
            InitStage::Middleware => write!(f, "middleware load"),
            InitStage::Source => write!(f, "source load"),
        }
    }
}

/// Binding errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad, missing or out-of-range configuration value
    #[error("Configuration error on {field}: {message}")]
    Config {
        /// Offending property or field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// Connector failure, retried by the retry middleware
    #[error("Connector error: {0}")]
    Connector(String),

    /// Connector failure that must not be retried
    #[error("Unrecoverable error: {0}")]
    Unrecoverable(String),

    /// All retry attempts failed
    #[error("Retry exhausted after {attempts} attempts: {}", join_errors(.errors))]
    RetryExhausted {
        /// Attempts made
        attempts: u32,
        /// Per-attempt errors, oldest first
        errors: Vec<Error>,
    },

    /// Binder initialization failed
    #[error("Binding {binding}: {stage} failed: {source}")]
    Init {
        /// Binding name
        binding: String,
        /// Failing stage
        stage: InitStage,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Unknown binding name
    #[error("Binding not found: {0}")]
    BindingNotFound(String),

    /// Binding name already registered
    #[error("Binding already exists: {0}")]
    BindingExists(String),

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Wait interrupted by cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Several independent failures
    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the retry middleware may re-attempt after this error
    pub fn is_recoverable(&self) -> bool {
        !self.is_cancelled() && !matches!(self, Error::Unrecoverable(_) | Error::Config { .. })
    }

    /// Whether cancellation ended the operation, directly or among combined errors
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Multiple(errors) => errors.iter().any(Error::is_cancelled),
            _ => false,
        }
    }

    /// Combine a list of errors, collapsing the single-error case
    pub fn combine(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("#{}: {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("; ")
}
