//! The four built-in action handlers.

use crate::capabilities::{JobTrigger, PredicateEvaluator, Transform};
use crate::domain::step::Step;
use crate::error::CoreError;
use crate::registry::{ActionHandler, ActionRegistry, BranchArm, StepContext, StepEffect};
use crate::retry::RetryPolicy;
use crate::types::ActionKind;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pause used when a delay step has no `seconds`
pub const DEFAULT_DELAY_SECONDS: f64 = 1.0;

/// Registry with all four built-in handlers wired to the given capabilities
pub fn standard_registry(
    trigger: Arc<dyn JobTrigger>,
    transform: Arc<dyn Transform>,
    evaluator: Arc<dyn PredicateEvaluator>,
    job_retry: RetryPolicy,
) -> ActionRegistry {
    ActionRegistry::builder()
        .register(Arc::new(TriggerJobHandler::new(trigger).with_retry(job_retry)))
        .register(Arc::new(TransformHandler::new(transform)))
        .register(Arc::new(DelayHandler))
        .register(Arc::new(BranchHandler::new(evaluator)))
        .build()
}

fn required<'a>(value: Option<&'a String>, field: &str, step: &Step) -> Result<&'a str, CoreError> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::ValidationError(format!(
            "step '{}' ({}) requires '{}'",
            step.name, step.action, field
        ))),
    }
}

/// `trigger-job`: starts an external job, retried per its policy
pub struct TriggerJobHandler {
    trigger: Arc<dyn JobTrigger>,
    retry: RetryPolicy,
}

impl TriggerJobHandler {
    /// Handler with the default job retry policy
    pub fn new(trigger: Arc<dyn JobTrigger>) -> Self {
        Self {
            trigger,
            retry: RetryPolicy::job_default(),
        }
    }

    /// Override the retry policy for every step this handler serves
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl ActionHandler for TriggerJobHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::TriggerJob
    }

    fn validate(&self, step: &Step) -> Result<(), CoreError> {
        required(step.job_name.as_ref(), "job_name", step).map(|_| ())
    }

    fn retry_policy(&self, step: &Step) -> Option<RetryPolicy> {
        Some(step.retry.unwrap_or(self.retry))
    }

    async fn invoke(&self, step: &Step, _ctx: &StepContext<'_>) -> Result<StepEffect, CoreError> {
        let job_name = required(step.job_name.as_ref(), "job_name", step)?;
        let outcome = self.trigger.trigger(job_name, &step.parameters).await?;

        if !outcome.is_success() {
            let detail = outcome
                .detail
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default();
            return Err(CoreError::HandlerError(format!(
                "job '{}' was not started ({:?}) {}",
                job_name, outcome.status, detail
            )));
        }

        debug!(job = job_name, status = ?outcome.status, "job triggered");
        Ok(StepEffect::Completed(Some(serde_json::to_value(&outcome)?)))
    }
}

/// `transform`: runs a named transform module
pub struct TransformHandler {
    transform: Arc<dyn Transform>,
}

impl TransformHandler {
    /// Handler backed by `transform`
    pub fn new(transform: Arc<dyn Transform>) -> Self {
        Self { transform }
    }
}

#[async_trait]
impl ActionHandler for TransformHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Transform
    }

    fn validate(&self, step: &Step) -> Result<(), CoreError> {
        required(step.module.as_ref(), "module", step).map(|_| ())
    }

    async fn invoke(&self, step: &Step, _ctx: &StepContext<'_>) -> Result<StepEffect, CoreError> {
        let module = required(step.module.as_ref(), "module", step)?;
        let result = self.transform.transform(module, &step.parameters).await?;
        Ok(StepEffect::Completed(Some(result)))
    }
}

/// `delay`: suspends the walk, interruptible by cancellation
#[derive(Debug, Default, Clone, Copy)]
pub struct DelayHandler;

impl DelayHandler {
    fn duration(step: &Step) -> Result<Duration, CoreError> {
        let seconds = step.seconds.unwrap_or(DEFAULT_DELAY_SECONDS);
        Duration::try_from_secs_f64(seconds).map_err(|_| {
            CoreError::ValidationError(format!(
                "step '{}' has invalid delay of {} seconds",
                step.name, seconds
            ))
        })
    }
}

#[async_trait]
impl ActionHandler for DelayHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Delay
    }

    fn validate(&self, step: &Step) -> Result<(), CoreError> {
        Self::duration(step).map(|_| ())
    }

    async fn invoke(&self, step: &Step, ctx: &StepContext<'_>) -> Result<StepEffect, CoreError> {
        let duration = Self::duration(step)?;
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(CoreError::Cancelled),
            _ = tokio::time::sleep(duration) => {
                Ok(StepEffect::Completed(Some(json!({ "seconds": duration.as_secs_f64() }))))
            }
        }
    }
}

/// `branch`: evaluates the condition and tells the interpreter which arm to walk
pub struct BranchHandler {
    evaluator: Arc<dyn PredicateEvaluator>,
}

impl BranchHandler {
    /// Handler backed by `evaluator`
    pub fn new(evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl ActionHandler for BranchHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Branch
    }

    fn validate(&self, step: &Step) -> Result<(), CoreError> {
        required(step.condition.as_ref(), "condition", step).map(|_| ())
    }

    async fn invoke(&self, step: &Step, ctx: &StepContext<'_>) -> Result<StepEffect, CoreError> {
        let condition = required(step.condition.as_ref(), "condition", step)?;
        let value = self.evaluator.evaluate(condition, ctx.scope).await?;
        Ok(StepEffect::Descend(BranchArm::from_condition(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::JobOutcome;
    use crate::logging::{LogSink, MemoryWriter};
    use serde_json::{Map, Value};
    use tokio_util::sync::CancellationToken;

    struct RejectingTrigger;

    #[async_trait]
    impl JobTrigger for RejectingTrigger {
        async fn trigger(&self, _job: &str, _params: &Map<String, Value>) -> Result<JobOutcome, CoreError> {
            Ok(JobOutcome::rejected(json!("no robot available")))
        }
    }

    struct EchoTransform;

    #[async_trait]
    impl Transform for EchoTransform {
        async fn transform(&self, module: &str, params: &Map<String, Value>) -> Result<Value, CoreError> {
            Ok(json!({ "module": module, "params": params }))
        }
    }

    struct ScopeLookup;

    #[async_trait]
    impl PredicateEvaluator for ScopeLookup {
        async fn evaluate(&self, expression: &str, scope: &Value) -> Result<bool, CoreError> {
            scope
                .get(expression)
                .and_then(Value::as_bool)
                .ok_or_else(|| CoreError::ExpressionError(format!("unknown variable {}", expression)))
        }
    }

    async fn invoke(handler: &dyn ActionHandler, step: &Step, scope: Value, cancel: &CancellationToken) -> Result<StepEffect, CoreError> {
        let sink: Arc<dyn LogSink> = Arc::new(MemoryWriter::new());
        let ctx = StepContext {
            process_name: "flow",
            depth: 0,
            scope: &scope,
            sink: &sink,
            cancel,
        };
        handler.invoke(step, &ctx).await
    }

    #[tokio::test]
    async fn test_rejected_job_is_a_failure() {
        let handler = TriggerJobHandler::new(Arc::new(RejectingTrigger));
        let step = Step::trigger_job("Trigger", "CreateServiceJob");

        let result = invoke(&handler, &step, json!({}), &CancellationToken::new()).await;

        match result {
            Err(CoreError::HandlerError(msg)) => assert!(msg.contains("no robot available")),
            other => panic!("expected handler error, got {:?}", other),
        }
    }

    #[test]
    fn test_trigger_job_requires_job_name_and_uses_step_retry() {
        let handler = TriggerJobHandler::new(Arc::new(RejectingTrigger));
        let mut step = Step::new("Trigger", ActionKind::TriggerJob);
        assert!(matches!(handler.validate(&step), Err(CoreError::ValidationError(_))));

        step.job_name = Some("Job".into());
        assert_eq!(handler.retry_policy(&step), Some(RetryPolicy::job_default()));

        let custom = RetryPolicy::new(5, Duration::from_millis(10));
        let step = step.with_retry(custom);
        assert_eq!(handler.retry_policy(&step), Some(custom));
    }

    #[tokio::test]
    async fn test_transform_passes_module_and_parameters() {
        let handler = TransformHandler::new(Arc::new(EchoTransform));
        let step = Step::transform("Normalize", "normalize").with_parameters(json!({"a": 1}));

        let effect = invoke(&handler, &step, json!({}), &CancellationToken::new()).await.unwrap();

        assert_eq!(
            effect,
            StepEffect::Completed(Some(json!({"module": "normalize", "params": {"a": 1}})))
        );
        assert!(handler.retry_policy(&step).is_none());
    }

    #[test]
    fn test_delay_validation() {
        let handler = DelayHandler;
        assert!(handler.validate(&Step::delay("ok", 0.0)).is_ok());
        assert!(handler.validate(&Step::new("default", ActionKind::Delay)).is_ok());
        assert!(matches!(
            handler.validate(&Step::delay("negative", -1.0)),
            Err(CoreError::ValidationError(_))
        ));
        assert!(handler.validate(&Step::delay("nan", f64::NAN)).is_err());
        assert!(handler.validate(&Step::delay("infinite", f64::INFINITY)).is_err());
    }

    #[tokio::test]
    async fn test_delay_too_long_for_a_duration_is_rejected() {
        let step = Step::delay("Forever", 1e20);
        assert!(matches!(DelayHandler.validate(&step), Err(CoreError::ValidationError(_))));

        let result = invoke(&DelayHandler, &step, json!({}), &CancellationToken::new()).await;
        assert!(matches!(result, Err(CoreError::ValidationError(msg)) if msg.contains("Forever")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_defaults_to_one_second() {
        let started = tokio::time::Instant::now();
        let effect = invoke(&DelayHandler, &Step::new("Wait", ActionKind::Delay), json!({}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(effect, StepEffect::Completed(Some(json!({"seconds": 1.0}))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_cancellable() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = invoke(&DelayHandler, &Step::delay("Wait", 3600.0), json!({}), &cancel).await;
        assert_eq!(result, Err(CoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_branch_selects_arm_from_evaluator() {
        let handler = BranchHandler::new(Arc::new(ScopeLookup));
        let step = Step::branch("Route", "approved", Default::default(), Default::default());
        let cancel = CancellationToken::new();

        let yes = invoke(&handler, &step, json!({"approved": true}), &cancel).await.unwrap();
        let no = invoke(&handler, &step, json!({"approved": false}), &cancel).await.unwrap();
        let err = invoke(&handler, &step, json!({}), &cancel).await;

        assert_eq!(yes, StepEffect::Descend(BranchArm::True));
        assert_eq!(no, StepEffect::Descend(BranchArm::False));
        assert!(matches!(err, Err(CoreError::ExpressionError(_))));
    }

    #[test]
    fn test_standard_registry_covers_the_closed_set() {
        let registry = standard_registry(
            Arc::new(RejectingTrigger),
            Arc::new(EchoTransform),
            Arc::new(ScopeLookup),
            RetryPolicy::job_default(),
        );

        assert_eq!(registry.len(), 4);
        for kind in [ActionKind::TriggerJob, ActionKind::Transform, ActionKind::Delay, ActionKind::Branch] {
            assert!(registry.resolve(&kind).is_some(), "missing {}", kind);
        }
    }
}
