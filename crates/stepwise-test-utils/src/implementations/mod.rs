//! Scripted fakes of the boundary capabilities.
//!
//! Unlike the mocks these need no expectations; they keep a record of what
//! they were asked to do so tests can assert on it afterwards.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use stepwise_core::{CoreError, JobOutcome, JobTrigger, PredicateEvaluator, Transform};

/// Trigger that fails a fixed number of times, then starts every job
#[derive(Debug, Default)]
pub struct FailingTrigger {
    failures: u32,
    calls: AtomicU32,
    jobs: Mutex<Vec<String>>,
}

impl FailingTrigger {
    /// Fail the first `failures` calls
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    /// Trigger that never fails
    pub fn reliable() -> Self {
        Self::new(0)
    }

    /// Trigger that always fails
    pub fn broken() -> Self {
        Self::new(u32::MAX)
    }

    /// Total calls so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Job names of every call, in order
    pub fn jobs(&self) -> Vec<String> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl JobTrigger for FailingTrigger {
    async fn trigger(&self, job_name: &str, _parameters: &Map<String, Value>) -> Result<JobOutcome, CoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs.lock().push(job_name.to_string());
        if call <= self.failures {
            return Err(CoreError::ExternalDependencyError(format!(
                "orchestrator unavailable (call {})",
                call
            )));
        }
        Ok(JobOutcome::started(Some(format!("job-{}", call))))
    }
}

/// Transform that echoes its parameters and records module names
#[derive(Debug, Default)]
pub struct RecordingTransform {
    failing: HashSet<String>,
    modules: Mutex<Vec<String>>,
}

impl RecordingTransform {
    /// Transform that succeeds for every module
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `module` fail with a handler error
    pub fn failing_on(mut self, module: impl Into<String>) -> Self {
        self.failing.insert(module.into());
        self
    }

    /// Modules run so far, in order
    pub fn modules(&self) -> Vec<String> {
        self.modules.lock().clone()
    }
}

#[async_trait]
impl Transform for RecordingTransform {
    async fn transform(&self, module: &str, parameters: &Map<String, Value>) -> Result<Value, CoreError> {
        self.modules.lock().push(module.to_string());
        if self.failing.contains(module) {
            return Err(CoreError::HandlerError(format!("module '{}' raised", module)));
        }
        Ok(Value::Object(parameters.clone()))
    }
}

/// Evaluator that returns the same answer for every expression
#[derive(Debug)]
pub struct FixedEvaluator {
    answer: bool,
    expressions: Mutex<Vec<String>>,
}

impl FixedEvaluator {
    /// Always answer `answer`
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            expressions: Mutex::new(Vec::new()),
        }
    }

    /// Expressions evaluated so far, in order
    pub fn expressions(&self) -> Vec<String> {
        self.expressions.lock().clone()
    }
}

#[async_trait]
impl PredicateEvaluator for FixedEvaluator {
    async fn evaluate(&self, expression: &str, _scope: &Value) -> Result<bool, CoreError> {
        self.expressions.lock().push(expression.to_string());
        Ok(self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_failing_trigger_recovers_after_failures() {
        let trigger = FailingTrigger::new(2);
        let params = Map::new();

        assert_matches!(trigger.trigger("A", &params).await, Err(CoreError::ExternalDependencyError(_)));
        assert_matches!(trigger.trigger("A", &params).await, Err(_));
        let outcome = trigger.trigger("A", &params).await.unwrap();

        assert_eq!(outcome.job_id.as_deref(), Some("job-3"));
        assert_eq!(trigger.calls(), 3);
        assert_eq!(trigger.jobs(), vec!["A", "A", "A"]);
    }

    #[tokio::test]
    async fn test_recording_transform() {
        let transform = RecordingTransform::new().failing_on("broken");

        assert!(transform.transform("ok", &Map::new()).await.is_ok());
        assert_matches!(transform.transform("broken", &Map::new()).await, Err(CoreError::HandlerError(_)));
        assert_eq!(transform.modules(), vec!["ok", "broken"]);
    }

    #[tokio::test]
    async fn test_fixed_evaluator() {
        let evaluator = FixedEvaluator::new(false);
        assert!(!evaluator.evaluate("x == 1", &Value::Null).await.unwrap());
        assert_eq!(evaluator.expressions(), vec!["x == 1"]);
    }
}
