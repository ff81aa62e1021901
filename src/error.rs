//! Error types for the Stepwise facade

use stepwise_core::CoreError;
use stepwise_dsl::DslError;
use thiserror::Error;

/// Setup and document failures of the facade.
///
/// Step failures are never errors here; they end up in the run summary.
#[derive(Error, Debug)]
pub enum StepwiseError {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The process document could not be loaded
    #[error("Process document error: {0}")]
    DocumentError(#[from] DslError),

    /// A component could not be constructed
    #[error("Setup error: {0}")]
    SetupError(#[from] CoreError),
}

impl StepwiseError {
    /// Stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            StepwiseError::ConfigError(_) => "ERR_CONFIG",
            StepwiseError::DocumentError(e) => e.error_code(),
            StepwiseError::SetupError(e) => e.kind(),
        }
    }
}

/// Result alias for the facade
pub type StepwiseResult<T> = Result<T, StepwiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StepwiseError::ConfigError("x".into()).error_code(), "ERR_CONFIG");
        assert_eq!(
            StepwiseError::from(DslError::MissingRequiredField("steps".into())).error_code(),
            "ERR_DSL_MISSING_FIELD"
        );
        assert_eq!(
            StepwiseError::from(CoreError::ConfigurationError("no url".into())).error_code(),
            "ERR_CONFIGURATION"
        );
    }
}
