//! Sequential walk over a step tree.
//!
//! Each step goes `Pending -> Running -> {Succeeded, Failed, Skipped}` exactly
//! once. A failing step never stops its siblings; the only early exit is
//! cancellation, checked before every step.

use crate::domain::outcome::{ErrorInfo, ExecutionOutcome, StepStatus};
use crate::domain::step::{Step, StepSequence};
use crate::error::CoreError;
use crate::logging::{LogEntry, LogSink};
use crate::registry::{ActionHandler, ActionRegistry, BranchArm, StepContext, StepEffect};
use crate::retry::RetryExecutor;
use crate::types::ActionKind;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default bound on branch nesting
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Interpreter tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Deepest branch nesting level that may be entered (the root sequence is level 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Everything one `execute` call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Walk {
    /// Outcomes in completion order, flattened across nesting levels
    pub outcomes: Vec<ExecutionOutcome>,
    /// Whether the walk stopped early because the run was cancelled
    pub cancelled: bool,
}

struct RunState {
    process_name: String,
    outcomes: Vec<ExecutionOutcome>,
    cancelled: bool,
}

impl RunState {
    fn record(&mut self, step: &Step, depth: usize, status: StepStatus, result: Result<Option<Value>, &CoreError>) {
        let (error, output) = match result {
            Ok(output) => (None, output),
            Err(err) => (Some(ErrorInfo::from(err)), None),
        };
        self.outcomes.push(ExecutionOutcome {
            step_name: step.name.clone(),
            action: step.action.clone(),
            status,
            error,
            depth,
            output,
        });
    }

    /// `{flow, steps, params}` view for branch conditions
    fn scope(&self, step: &Step) -> Value {
        let mut steps = Map::new();
        for outcome in &self.outcomes {
            steps.insert(
                outcome.step_name.clone(),
                json!({
                    "status": outcome.status.as_str(),
                    "output": outcome.output.clone().unwrap_or(Value::Null),
                }),
            );
        }
        json!({
            "flow": { "name": self.process_name },
            "steps": steps,
            "params": step.parameters,
        })
    }
}

/// Walks a [`StepSequence`], dispatching each step through an [`ActionRegistry`]
pub struct StepInterpreter {
    registry: ActionRegistry,
    sink: Arc<dyn LogSink>,
    config: InterpreterConfig,
    cancel: CancellationToken,
}

impl StepInterpreter {
    /// Interpreter with default configuration
    pub fn new(registry: ActionRegistry, sink: Arc<dyn LogSink>) -> Self {
        Self {
            registry,
            sink,
            config: InterpreterConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the walk when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration in use
    pub fn config(&self) -> InterpreterConfig {
        self.config
    }

    /// Audit sink the interpreter writes to
    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }

    /// Walk `sequence` in order. Never fails; every step error is recorded
    /// in its outcome.
    pub async fn execute(&self, process_name: &str, sequence: &StepSequence) -> Walk {
        let mut run = RunState {
            process_name: process_name.to_string(),
            outcomes: Vec::with_capacity(sequence.total_steps()),
            cancelled: false,
        };
        self.walk(&mut run, sequence, 0).await;
        Walk {
            outcomes: run.outcomes,
            cancelled: run.cancelled,
        }
    }

    fn walk<'a>(&'a self, run: &'a mut RunState, sequence: &'a StepSequence, depth: usize) -> BoxFuture<'a, ()> {
        async move {
            for step in sequence {
                if self.cancel.is_cancelled() {
                    if !run.cancelled {
                        debug!(step = %step.name, "run cancelled, remaining steps not visited");
                    }
                    run.cancelled = true;
                    return;
                }
                self.run_step(run, step, depth).await;
            }
        }
        .boxed()
    }

    async fn run_step(&self, run: &mut RunState, step: &Step, depth: usize) {
        self.log(step, LogEntry::info(&run.process_name, format!("step starting ({})", step.action)))
            .await;

        let Some(handler) = self.registry.resolve(&step.action) else {
            self.log(
                step,
                LogEntry::warn(
                    &run.process_name,
                    format!("unsupported action '{}', step skipped", step.action),
                ),
            )
            .await;
            run.record(step, depth, StepStatus::Skipped, Ok(None));
            return;
        };

        let scope = if step.action == ActionKind::Branch {
            run.scope(step)
        } else {
            Value::Null
        };
        let ctx = StepContext {
            process_name: &run.process_name,
            depth,
            scope: &scope,
            sink: &self.sink,
            cancel: &self.cancel,
        };
        let result = self.dispatch(handler.as_ref(), step, &ctx).await;

        match result {
            Ok(StepEffect::Completed(output)) => {
                self.log(step, LogEntry::info(&run.process_name, "step completed")).await;
                run.record(step, depth, StepStatus::Succeeded, Ok(output));
            }
            Ok(StepEffect::Descend(arm)) => self.descend(run, step, depth, arm).await,
            Err(err) => self.fail(run, step, depth, err).await,
        }
    }

    async fn dispatch(
        &self,
        handler: &dyn ActionHandler,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<StepEffect, CoreError> {
        if let Some(problem) = &step.malformed {
            return Err(CoreError::ValidationError(format!(
                "step '{}' is malformed: {}",
                step.name, problem
            )));
        }
        handler.validate(step)?;

        match handler.retry_policy(step) {
            Some(policy) => {
                RetryExecutor::new(policy, self.sink.clone())
                    .with_context(ctx.process_name, Some(step.name.clone()))
                    .with_cancellation(self.cancel.clone())
                    .execute(|| handler.invoke(step, ctx))
                    .await
            }
            None => handler.invoke(step, ctx).await,
        }
    }

    async fn descend(&self, run: &mut RunState, step: &Step, depth: usize, arm: BranchArm) {
        self.log(
            step,
            LogEntry::info(
                &run.process_name,
                format!("condition evaluated to {}, taking {}", arm == BranchArm::True, arm),
            ),
        )
        .await;

        let child_depth = depth + 1;
        if child_depth > self.config.max_depth {
            self.fail(run, step, depth, CoreError::DepthExceeded(self.config.max_depth))
                .await;
            return;
        }

        let children = match arm {
            BranchArm::True => &step.true_flow,
            BranchArm::False => &step.false_flow,
        };
        self.walk(run, children, child_depth).await;

        self.log(step, LogEntry::info(&run.process_name, "step completed")).await;
        run.record(
            step,
            depth,
            StepStatus::Succeeded,
            Ok(Some(json!({ "condition": arm == BranchArm::True, "arm": arm.as_str() }))),
        );
    }

    async fn fail(&self, run: &mut RunState, step: &Step, depth: usize, err: CoreError) {
        self.log(step, LogEntry::error(&run.process_name, format!("step failed: {}", err)))
            .await;
        run.record(step, depth, StepStatus::Failed, Err(&err));
    }

    async fn log(&self, step: &Step, entry: LogEntry) {
        self.sink.write(entry.for_step(&step.name)).await;
    }
}
