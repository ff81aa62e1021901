use thiserror::Error;

/// Core error type for the Stepwise runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A step is malformed for its action kind (missing field, negative delay, ...)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A capability invoked by a handler reported a failure
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// A named component (transform module, job) is not registered
    #[error("Component not found: {0}")]
    ComponentNotFoundError(String),

    /// Predicate expression could not be parsed or evaluated
    #[error("Expression evaluation error: {0}")]
    ExpressionError(String),

    /// Remote system (orchestrator, audit store) error
    #[error("External dependency error: {0}")]
    ExternalDependencyError(String),

    /// All retry attempts failed; `last` is the final attempt's error
    #[error("All {attempts} attempts failed; last error: {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: Box<CoreError>,
    },

    /// Nested branches exceeded the configured depth
    #[error("Maximum branch depth {0} exceeded")]
    DepthExceeded(usize),

    /// The run was cancelled while the step was in flight
    #[error("Execution cancelled")]
    Cancelled,

    /// Input/output error
    #[error("Input/output error: {0}")]
    IOError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Stable error code used in outcome records and audit entries
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "ERR_VALIDATION",
            CoreError::HandlerError(_) => "ERR_HANDLER",
            CoreError::ComponentNotFoundError(_) => "ERR_COMPONENT_NOT_FOUND",
            CoreError::ExpressionError(_) => "ERR_EXPRESSION",
            CoreError::ExternalDependencyError(_) => "ERR_EXTERNAL_DEPENDENCY",
            CoreError::RetryExhausted { .. } => "ERR_RETRY_EXHAUSTED",
            CoreError::DepthExceeded(_) => "ERR_DEPTH_EXCEEDED",
            CoreError::Cancelled => "ERR_CANCELLED",
            CoreError::IOError(_) => "ERR_IO",
            CoreError::SerializationError(_) => "ERR_SERIALIZATION",
            CoreError::ConfigurationError(_) => "ERR_CONFIGURATION",
            CoreError::Other(_) => "ERR_OTHER",
        }
    }

    /// The innermost error: unwraps `RetryExhausted` down to the last attempt's error
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::RetryExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::IOError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
