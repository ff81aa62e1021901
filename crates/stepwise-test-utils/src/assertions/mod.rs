//! Assertion utilities for run summaries.

use stepwise_core::RunSummary;
use thiserror::Error;

/// Error type for run summary validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunAssertionError {
    #[error("Unexpected {field} count: expected {expected}, got {actual}")]
    CountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unexpected visit order: expected {expected:?}, got {actual:?}")]
    OrderMismatch { expected: Vec<String>, actual: Vec<String> },
}

/// Asserts the succeeded, failed and skipped counts of a run.
///
/// # Returns
///
/// * `Ok(())` - If every count matches
/// * `Err(RunAssertionError)` - For the first count that does not
pub fn assert_counts(
    summary: &RunSummary,
    succeeded: usize,
    failed: usize,
    skipped: usize,
) -> Result<(), RunAssertionError> {
    for (field, expected, actual) in [
        ("succeeded", succeeded, summary.succeeded),
        ("failed", failed, summary.failed),
        ("skipped", skipped, summary.skipped),
    ] {
        if expected != actual {
            return Err(RunAssertionError::CountMismatch {
                field,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Asserts the order in which steps finished
pub fn assert_visit_order(summary: &RunSummary, expected: &[&str]) -> Result<(), RunAssertionError> {
    let actual: Vec<String> = summary.outcomes.iter().map(|o| o.step_name.clone()).collect();
    if actual != expected {
        return Err(RunAssertionError::OrderMismatch {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual,
        });
    }
    Ok(())
}
