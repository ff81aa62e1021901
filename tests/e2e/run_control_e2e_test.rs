//! Cancellation and nesting limits seen through the facade.

use pretty_assertions::assert_eq;
use std::time::Duration;
use stepwise::RuntimeConfig;
use stepwise_core::{LogLevel, StepStatus, DEFAULT_MAX_DEPTH};
use stepwise_dsl::ProcessDefinition;
use stepwise_test_utils::{nested_branch_sequence, RecordingTransform};
use stepwise_tests::{json_process, Harness};

const SLOW_FLOW: &str = r#"{
  "name": "Slow",
  "steps": [
    {"name": "Long Wait", "action": "delay", "seconds": 30},
    {"name": "Never", "action": "trigger-job", "job_name": "Unreached"}
  ]
}"#;

#[tokio::test(start_paused = true)]
async fn test_cancel_during_delay_stops_the_run() {
    let harness = Harness::new(0, RecordingTransform::new());
    let token = harness.stepwise.cancellation_token();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let summary = harness.stepwise.run(&json_process(SLOW_FLOW)).await;
    canceller.await.unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_clean());
    assert_eq!(summary.outcomes.len(), 1);
    let wait = summary.outcome("Long Wait").unwrap();
    assert_eq!(wait.status, StepStatus::Failed);
    assert_eq!(wait.error.as_ref().unwrap().kind, "ERR_CANCELLED");
    assert_eq!(harness.trigger.calls(), 0);

    let last = harness.audit.entries().pop().unwrap();
    assert_eq!(last.message, "flow completed: 0 succeeded, 1 failed, 0 skipped (cancelled)");

    // the token stays cancelled, so a later run visits nothing
    let again = harness.stepwise.run(&json_process(SLOW_FLOW)).await;
    assert!(again.cancelled);
    assert!(again.outcomes.is_empty());
}

#[tokio::test]
async fn test_deep_nesting_fails_at_the_configured_limit() {
    let harness = Harness::new(0, RecordingTransform::new());
    let definition = ProcessDefinition {
        name: "Deep".into(),
        steps: nested_branch_sequence(200, "true"),
    };

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.branches_taken, DEFAULT_MAX_DEPTH);
    let failed = summary
        .outcomes
        .iter()
        .find(|o| o.status == StepStatus::Failed)
        .unwrap();
    assert_eq!(failed.step_name, format!("branch-{}", DEFAULT_MAX_DEPTH));
    assert_eq!(failed.error.as_ref().unwrap().kind, "ERR_DEPTH_EXCEEDED");
    assert!(harness.transform.modules().is_empty());
    assert_eq!(harness.entries_at(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_shallow_limit_from_configuration() {
    let mut config = RuntimeConfig::default();
    config.interpreter.max_depth = 3;
    let harness = Harness::with_config(config, 0, RecordingTransform::new());
    let definition = ProcessDefinition {
        name: "Shallow".into(),
        steps: nested_branch_sequence(3, "flow.name == 'Shallow'"),
    };

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.branches_taken, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.outcome("leaf").map(|o| o.depth), Some(3));
    assert_eq!(harness.transform.modules(), vec!["echo"]);
}
