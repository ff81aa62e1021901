//! Runtime configuration
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! runnable mock-mode setup. `STEPWISE_*` environment variables override
//! whatever the file says.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepwise_core::{InterpreterConfig, RetryPolicy, DEFAULT_MAX_DEPTH};
use stepwise_stdlib::{OrchestratorAuth, OrchestratorConfig};
use tracing::{info, warn};

use crate::error::StepwiseError;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Diagnostics and audit file
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Structured audit store
    #[serde(default)]
    pub audit: AuditConfig,

    /// Job orchestrator
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Interpreter limits and job retry defaults
    #[serde(default)]
    pub interpreter: InterpreterSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Append-only audit file
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/process.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            log_file: default_log_file(),
        }
    }
}

/// Audit store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether entries also go to the database
    #[serde(default)]
    pub enabled: bool,

    /// Postgres connection string
    #[serde(default)]
    pub database_url: Option<String>,

    /// Bound on each insert, in milliseconds
    #[serde(default = "default_audit_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_audit_timeout_ms() -> u64 {
    5_000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: None,
            timeout_ms: default_audit_timeout_ms(),
        }
    }
}

impl AuditConfig {
    /// Insert timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Interpreter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterSettings {
    /// Deepest branch nesting allowed
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Attempts for `trigger-job` steps without their own `retry`
    #[serde(default = "default_job_retry_attempts")]
    pub job_retry_attempts: u32,

    /// Pause between those attempts, in milliseconds
    #[serde(default = "default_job_retry_delay_ms")]
    pub job_retry_delay_ms: u64,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_job_retry_attempts() -> u32 {
    RetryPolicy::job_default().max_attempts
}

fn default_job_retry_delay_ms() -> u64 {
    RetryPolicy::job_default().delay_ms
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            job_retry_attempts: default_job_retry_attempts(),
            job_retry_delay_ms: default_job_retry_delay_ms(),
        }
    }
}

impl InterpreterSettings {
    /// Core interpreter configuration
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_depth: self.max_depth,
        }
    }

    /// Default retry policy for job triggers
    pub fn job_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.job_retry_attempts,
            delay_ms: self.job_retry_delay_ms,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional file, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, StepwiseError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        info!("Loaded runtime configuration");
        Ok(config)
    }

    /// Parse a JSON or YAML file (by extension; anything else is tried as YAML)
    pub fn from_file(path: &Path) -> Result<Self, StepwiseError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StepwiseError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&text)
                .map_err(|e| StepwiseError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
        } else if text.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(&text)
                .map_err(|e| StepwiseError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
        }
    }

    /// Apply `STEPWISE_*` overrides from `lookup`; unparsable values are logged and ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup("STEPWISE_LOG_FILTER") {
            self.logging.filter = filter;
        }

        if let Some(log_file) = lookup("STEPWISE_LOG_FILE") {
            self.logging.log_file = PathBuf::from(log_file);
        }

        if let Some(enabled) = lookup("STEPWISE_AUDIT_ENABLED") {
            match parse_flag(&enabled) {
                Some(flag) => self.audit.enabled = flag,
                None => warn!("Invalid STEPWISE_AUDIT_ENABLED value: {}", enabled),
            }
        }

        if let Some(url) = lookup("STEPWISE_DATABASE_URL") {
            self.audit.database_url = Some(url);
        }

        if let Some(url) = lookup("STEPWISE_ORCHESTRATOR_URL") {
            self.orchestrator.orchestrator_url = url;
        }

        if let Some(mock) = lookup("STEPWISE_ORCHESTRATOR_MOCK") {
            match parse_flag(&mock) {
                Some(flag) => self.orchestrator.mock = flag,
                None => warn!("Invalid STEPWISE_ORCHESTRATOR_MOCK value: {}", mock),
            }
        }

        if let Some(token) = lookup("STEPWISE_ORCHESTRATOR_TOKEN") {
            self.orchestrator.auth = Some(OrchestratorAuth::Static { token });
        }

        if let Some(depth) = lookup("STEPWISE_MAX_DEPTH") {
            match depth.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => self.interpreter.max_depth = depth,
                _ => warn!("Invalid STEPWISE_MAX_DEPTH value: {}", depth),
            }
        }

        if self.audit.enabled && self.audit.database_url.is_none() {
            warn!("Audit store enabled but no STEPWISE_DATABASE_URL provided - entries go to the log file only");
        }

        if !self.orchestrator.mock && self.orchestrator.auth.is_none() {
            warn!("Orchestrator mock mode is off but no credentials are configured");
        }
    }
}
