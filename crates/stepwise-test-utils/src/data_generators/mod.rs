//! Generators for sample process documents and step trees.

use stepwise_core::{Step, StepSequence};

/// The customer service flow in its legacy JSON spelling.
///
/// Preprocesses the customer, triggers the service job, then branches on
/// whether preprocessing succeeded: a short wait on the true arm, a job
/// trigger on the false arm.
pub fn sample_process_json() -> String {
    r#"{
  "name": "DMS Service Flow",
  "steps": [
    {
      "name": "Preprocess Customer",
      "action": "python",
      "module": "preprocess_customer",
      "params": {"customer": {"name": "  ali veli ", "phone": "+90 (555) 123 45 67"}}
    },
    {
      "name": "Trigger CreateService",
      "action": "uipath",
      "bot_name": "CreateServiceJob",
      "parameters": {"customer_id": 42}
    },
    {
      "name": "Check Preprocessing",
      "action": "condition",
      "condition": "steps['Preprocess Customer'].status == 'succeeded'",
      "true_flow": {"steps": [{"name": "Wait Short", "action": "wait", "seconds": 1}]},
      "false_flow": {"steps": [{"name": "Notify Ops", "action": "uipath", "bot_name": "NotifyOps"}]}
    }
  ]
}"#
    .to_string()
}

/// A YAML document using the canonical action names and a retry override
pub fn sample_process_yaml() -> String {
    r#"
name: Nightly Reconciliation
steps:
  - name: Normalise Input
    action: transform
    module: preprocess_customer
    parameters:
      customer:
        name: mehmet
        phone: "0 (212) 555 00 00"
  - name: Start Reconciliation
    action: trigger-job
    job_name: Reconcile
    retry:
      max_attempts: 2
      delay_ms: 10
  - name: Large Batch
    action: branch
    condition: "params.batch_size > 100"
    parameters:
      batch_size: 20
    true_flow:
      - name: Cool Down
        action: delay
        seconds: 0.5
    false_flow: []
  - name: Send Email
    action: email
"#
    .to_string()
}

/// A chain of `depth` branch steps, each nesting the next in its true arm.
///
/// The innermost arm holds a single transform step named `leaf`.
pub fn nested_branch_sequence(depth: usize, condition: &str) -> StepSequence {
    let mut inner = StepSequence::new(vec![Step::transform("leaf", "echo")]);
    for level in (0..depth).rev() {
        inner = StepSequence::new(vec![Step::branch(
            format!("branch-{}", level),
            condition,
            inner,
            StepSequence::default(),
        )]);
    }
    inner
}
