use crate::error::CoreError;
use crate::types::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Terminal state of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Handler completed without error
    Succeeded,
    /// Handler (or validation) failed; siblings still ran
    Failed,
    /// Action kind has no registered handler
    Skipped,
}

impl StepStatus {
    /// Lower-case label used in predicate scopes
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// Error details recorded for a failed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code, see [`CoreError::kind`]
    pub kind: String,
    /// Human readable message
    pub message: String,
}

impl From<&CoreError> for ErrorInfo {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Name of the step
    pub step_name: String,
    /// Action kind of the step
    pub action: ActionKind,
    /// Terminal state
    pub status: StepStatus,
    /// Failure details when `status` is `Failed`
    pub error: Option<ErrorInfo>,
    /// Branch nesting level the step ran at (0 for the root sequence)
    pub depth: usize,
    /// Value produced by the handler, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ExecutionOutcome {
    /// Whether the step succeeded
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of the run
    pub run_id: Uuid,
    /// Name of the process document
    pub process_name: String,
    /// Steps that succeeded (branch steps are not counted here)
    pub succeeded: usize,
    /// Steps that failed, including branch steps whose evaluation failed
    pub failed: usize,
    /// Steps skipped because their action kind is unsupported
    pub skipped: usize,
    /// Branch steps that evaluated their condition and walked an arm
    pub branches_taken: usize,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
    /// Every outcome in completion order, flattened across nesting levels
    pub outcomes: Vec<ExecutionOutcome>,
}

impl RunSummary {
    /// Tally a list of outcomes
    pub fn from_outcomes(
        process_name: impl Into<String>,
        outcomes: Vec<ExecutionOutcome>,
        cancelled: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self {
            run_id: Uuid::new_v4(),
            process_name: process_name.into(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            branches_taken: 0,
            cancelled,
            started_at,
            finished_at: Utc::now(),
            outcomes: Vec::new(),
        };

        for outcome in &outcomes {
            match (outcome.status, &outcome.action) {
                (StepStatus::Succeeded, ActionKind::Branch) => summary.branches_taken += 1,
                (StepStatus::Succeeded, _) => summary.succeeded += 1,
                (StepStatus::Failed, _) => summary.failed += 1,
                (StepStatus::Skipped, _) => summary.skipped += 1,
            }
        }
        summary.outcomes = outcomes;
        summary
    }

    /// Whether no step failed
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Outcome for the first step with the given name
    pub fn outcome(&self, step_name: &str) -> Option<&ExecutionOutcome> {
        self.outcomes.iter().find(|o| o.step_name == step_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, action: ActionKind, status: StepStatus) -> ExecutionOutcome {
        ExecutionOutcome {
            step_name: name.to_string(),
            action,
            status,
            error: None,
            depth: 0,
            output: None,
        }
    }

    #[test]
    fn test_branch_success_is_tallied_separately() {
        let summary = RunSummary::from_outcomes(
            "flow",
            vec![
                outcome("wait", ActionKind::Delay, StepStatus::Succeeded),
                outcome("route", ActionKind::Branch, StepStatus::Succeeded),
                outcome("bad-route", ActionKind::Branch, StepStatus::Failed),
                outcome("future", ActionKind::parse("noop-future"), StepStatus::Skipped),
            ],
            false,
            Utc::now(),
        );

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.branches_taken, 1);
        assert!(!summary.is_clean());
        assert!(summary.outcome("wait").unwrap().succeeded());
    }

    #[test]
    fn test_error_info_from_core_error() {
        let info = ErrorInfo::from(&CoreError::ValidationError("negative delay".into()));
        assert_eq!(info.kind, "ERR_VALIDATION");
        assert_eq!(info.message, "Validation error: negative delay");
    }
}
