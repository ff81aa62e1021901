//! End-to-end scenarios over the full facade: document → interpreter → audit trail

use pretty_assertions::assert_eq;
use stepwise_core::{LogLevel, StepStatus};
use stepwise_test_utils::{assert_counts, assert_visit_order, RecordingTransform};
use stepwise_tests::{json_process, Harness};

#[tokio::test]
async fn test_transform_then_retried_trigger_then_delay() {
    let harness = Harness::new(1, RecordingTransform::new());
    let definition = json_process(
        r#"{
          "name": "Scenario A",
          "steps": [
            {"name": "Normalize", "action": "transform", "module": "normalize", "parameters": {"customer": {"name": "ali"}}},
            {"name": "Start X", "action": "trigger-job", "job_name": "X", "parameters": {"customer_id": 7}},
            {"name": "Settle", "action": "delay", "seconds": 0}
          ]
        }"#,
    );

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(assert_counts(&summary, 3, 0, 0), Ok(()));
    assert_eq!(assert_visit_order(&summary, &["Normalize", "Start X", "Settle"]), Ok(()));
    assert_eq!(harness.trigger.calls(), 2);
    assert_eq!(harness.transform.modules(), vec!["normalize"]);

    // the failed first attempt is audited even though the step succeeded
    let errors = harness.entries_at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].step_name.as_deref(), Some("Start X"));
    assert!(summary.is_clean());
}

#[tokio::test(start_paused = true)]
async fn test_false_condition_walks_only_the_false_arm() {
    let harness = Harness::new(0, RecordingTransform::new().failing_on("explode"));
    let definition = json_process(
        r#"{
          "name": "Scenario B",
          "steps": [
            {
              "name": "Big Order?",
              "action": "branch",
              "condition": "params.amount > 100",
              "parameters": {"amount": 40},
              "true_flow": {"steps": [{"name": "Explode", "action": "transform", "module": "explode"}]},
              "false_flow": {"steps": [{"name": "Wait", "action": "delay", "seconds": 1}]}
            }
          ]
        }"#,
    );

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(assert_counts(&summary, 1, 0, 0), Ok(()));
    assert_eq!(summary.branches_taken, 1);
    assert!(summary.outcome("Explode").is_none());
    assert_eq!(summary.outcome("Wait").map(|o| o.depth), Some(1));
    assert!(harness.transform.modules().is_empty());

    let decision = harness
        .entries_at(LogLevel::Info)
        .into_iter()
        .find(|e| e.message.starts_with("condition evaluated"))
        .unwrap();
    assert_eq!(decision.message, "condition evaluated to false, taking false_flow");
}

#[tokio::test]
async fn test_unknown_action_is_skipped_with_a_warning() {
    let harness = Harness::new(0, RecordingTransform::new());
    let definition = json_process(r#"{"name": "Scenario C", "steps": [{"name": "Later", "action": "noop-future"}]}"#);

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(assert_counts(&summary, 0, 0, 1), Ok(()));
    assert_eq!(summary.outcome("Later").unwrap().status, StepStatus::Skipped);

    let warnings = harness.entries_at(LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("noop-future"));
    assert_eq!(harness.trigger.calls(), 0);
}

#[tokio::test]
async fn test_failed_step_does_not_stop_its_siblings() {
    let harness = Harness::new(0, RecordingTransform::new().failing_on("broken"));
    let definition = json_process(
        r#"{
          "name": "Isolation",
          "steps": [
            {"name": "First", "action": "transform", "module": "broken"},
            {"name": "No Module", "action": "transform"},
            {"name": "Negative", "action": "delay", "seconds": -1},
            {"name": "Last", "action": "trigger-job", "job_name": "Tail"}
          ]
        }"#,
    );

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(assert_counts(&summary, 1, 3, 0), Ok(()));
    assert_eq!(summary.outcome("First").unwrap().error.as_ref().unwrap().kind, "ERR_HANDLER");
    assert_eq!(summary.outcome("No Module").unwrap().error.as_ref().unwrap().kind, "ERR_VALIDATION");
    assert_eq!(summary.outcome("Negative").unwrap().error.as_ref().unwrap().kind, "ERR_VALIDATION");
    assert!(summary.outcome("Last").unwrap().succeeded());
    assert_eq!(harness.trigger.jobs(), vec!["Tail"]);
}

#[tokio::test]
async fn test_wrongly_typed_field_fails_only_its_step() {
    let harness = Harness::new(0, RecordingTransform::new());
    let definition = json_process(
        r#"{
          "name": "Typo",
          "steps": [
            {"name": "ok", "action": "delay", "seconds": 0},
            {"name": "bad", "action": "delay", "seconds": "five"},
            {"name": "Normalize", "action": "transform", "module": "normalize"},
            {"name": "Huge", "action": "delay", "seconds": 1e20}
          ]
        }"#,
    );

    let summary = harness.stepwise.run(&definition).await;

    assert_eq!(assert_counts(&summary, 2, 2, 0), Ok(()));
    assert_eq!(assert_visit_order(&summary, &["ok", "bad", "Normalize", "Huge"]), Ok(()));
    for name in ["bad", "Huge"] {
        let outcome = summary.outcome(name).unwrap();
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.error.as_ref().unwrap().kind, "ERR_VALIDATION");
    }
    assert_eq!(harness.transform.modules(), vec!["normalize"]);
    assert_eq!(harness.entries_at(LogLevel::Error).len(), 2);
}
