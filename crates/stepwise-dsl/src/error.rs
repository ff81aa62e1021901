use stepwise_core::CoreError;
use thiserror::Error;

/// All possible errors that can occur while loading a process document
#[derive(Error, Debug)]
pub enum DslError {
    /// Errors that occur during YAML parsing
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Errors that occur during JSON parsing
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The document file could not be read
    #[error("Could not read process document: {0}")]
    IoError(#[from] std::io::Error),

    /// The file extension does not name a supported format
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
}

impl DslError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::YamlError(_) => "ERR_DSL_YAML_PARSE",
            DslError::JsonError(_) => "ERR_DSL_JSON_PARSE",
            DslError::IoError(_) => "ERR_DSL_IO",
            DslError::UnsupportedFormat(_) => "ERR_DSL_UNSUPPORTED_FORMAT",
            DslError::MissingRequiredField(_) => "ERR_DSL_MISSING_FIELD",
        }
    }
}

impl From<DslError> for CoreError {
    fn from(err: DslError) -> Self {
        match err {
            DslError::IoError(e) => CoreError::IOError(e.to_string()),
            DslError::YamlError(_) | DslError::JsonError(_) => CoreError::SerializationError(err.to_string()),
            other => CoreError::ValidationError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_core_conversion() {
        let err = DslError::MissingRequiredField("steps".into());
        assert_eq!(err.error_code(), "ERR_DSL_MISSING_FIELD");
        assert_eq!(
            CoreError::from(err),
            CoreError::ValidationError("Missing required field: steps".into())
        );

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DslError::from(json_err);
        assert_eq!(err.error_code(), "ERR_DSL_JSON_PARSE");
        assert!(matches!(CoreError::from(err), CoreError::SerializationError(_)));
    }
}
