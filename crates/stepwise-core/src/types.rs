use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator selecting which handler executes a step.
///
/// Parsing never fails: strings outside the closed set are kept verbatim as
/// [`ActionKind::Unsupported`] so the interpreter can skip them with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Start an external automation job
    TriggerJob,
    /// Run an in-process transform module
    Transform,
    /// Pause for a fixed duration
    Delay,
    /// Evaluate a condition and walk one of two nested sequences
    Branch,
    /// Recognised but unhandled action identifier
    Unsupported(String),
}

impl ActionKind {
    /// Parse an action identifier, accepting the legacy spellings used by older documents
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trigger-job" | "trigger_job" | "uipath" => ActionKind::TriggerJob,
            "transform" | "python" => ActionKind::Transform,
            "delay" | "wait" => ActionKind::Delay,
            "branch" | "condition" => ActionKind::Branch,
            _ => ActionKind::Unsupported(raw.to_string()),
        }
    }

    /// Canonical identifier
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::TriggerJob => "trigger-job",
            ActionKind::Transform => "transform",
            ActionKind::Delay => "delay",
            ActionKind::Branch => "branch",
            ActionKind::Unsupported(raw) => raw,
        }
    }

    /// Whether this kind is part of the built-in set
    pub fn is_supported(&self) -> bool {
        !matches!(self, ActionKind::Unsupported(_))
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        ActionKind::parse(&raw)
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        ActionKind::parse(raw)
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Normal progress
    Info,
    /// Recoverable or ignorable condition
    Warn,
    /// Failure
    Error,
}

impl LogLevel {
    /// Upper-case label used by the console and file writers
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
