//! Boundary capabilities consumed by the interpreter.
//!
//! The core never implements these itself; concrete clients live in
//! `stepwise-stdlib` and test doubles in `stepwise-test-utils`.

use crate::error::CoreError;
use crate::logging::LogEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported by a job trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The remote system accepted and started the job
    Started,
    /// Mock mode: nothing was contacted
    Mocked,
    /// The remote system answered but refused the job
    Rejected,
}

/// What a job trigger returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Trigger status
    pub status: JobStatus,
    /// Remote job identifier, when the remote system returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Raw remote response or refusal reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl JobOutcome {
    /// Outcome of a job that was started remotely
    pub fn started(job_id: Option<String>) -> Self {
        Self {
            status: JobStatus::Started,
            job_id,
            detail: None,
        }
    }

    /// Outcome of a trigger in mock mode
    pub fn mocked() -> Self {
        Self {
            status: JobStatus::Mocked,
            job_id: None,
            detail: None,
        }
    }

    /// Outcome of a refused job
    pub fn rejected(detail: Value) -> Self {
        Self {
            status: JobStatus::Rejected,
            job_id: None,
            detail: Some(detail),
        }
    }

    /// Anything other than started or mocked counts as a failure
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Started | JobStatus::Mocked)
    }
}

/// External automation job trigger
#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Start the named job with the given parameters
    async fn trigger(&self, job_name: &str, parameters: &Map<String, Value>) -> Result<JobOutcome, CoreError>;
}

/// Name-addressed data transform
#[async_trait]
pub trait Transform: Send + Sync {
    /// Run the named transform module
    async fn transform(&self, module: &str, parameters: &Map<String, Value>) -> Result<Value, CoreError>;
}

/// Boolean predicate evaluator over a restricted scope
#[async_trait]
pub trait PredicateEvaluator: Send + Sync {
    /// Evaluate `expression` against `scope`
    async fn evaluate(&self, expression: &str, scope: &Value) -> Result<bool, CoreError>;
}

/// Optional structured store for audit entries
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Short name used in warnings when the store is unavailable
    fn name(&self) -> &str {
        "audit-store"
    }

    /// Persist one entry
    async fn insert(&self, entry: &LogEntry) -> Result<(), CoreError>;
}
