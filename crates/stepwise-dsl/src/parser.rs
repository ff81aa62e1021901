use crate::document::ProcessDocument;
use crate::error::DslError;
use crate::ProcessDefinition;
use std::path::Path;
use stepwise_core::StepSequence;
use tracing::debug;

/// Serialisation of a process document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, DslError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(DocumentFormat::Json),
            Some("yaml") | Some("yml") => Ok(DocumentFormat::Yaml),
            _ => Err(DslError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse document text into a [`ProcessDefinition`].
///
/// Only the shape is checked here; kind-specific fields (a delay's seconds,
/// a branch's condition) are validated by the handlers when the step runs,
/// and a field of the wrong type only marks its own step as malformed.
pub fn parse_process_document(text: &str, format: DocumentFormat) -> Result<ProcessDefinition, DslError> {
    let document: ProcessDocument = match format {
        DocumentFormat::Json => serde_json::from_str(text)?,
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
    };

    let name = document.process_name();
    let Some(steps) = document.steps else {
        return Err(DslError::MissingRequiredField("steps".to_string()));
    };

    let steps: StepSequence = steps.into_iter().map(|s| s.into_step()).collect();
    debug!(process = %name, steps = steps.total_steps(), "process document parsed");

    Ok(ProcessDefinition { name, steps })
}

/// Read and parse a process document, choosing the format by extension
pub fn load_process_file(path: impl AsRef<Path>) -> Result<ProcessDefinition, DslError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    parse_process_document(&text, format)
}
