//!
//! Stepwise Core - step interpreter for declarative process documents
//!
//! This crate holds the step model, the action registry and its built-in
//! handlers, the retry executor, the audit log fan-out and the interpreter
//! that walks a step tree. Concrete capabilities (job triggers, transforms,
//! predicate evaluation, audit stores) are plugged in through the traits in
//! [`capabilities`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - steps, outcomes and run summaries
pub mod domain;

/// Boundary capabilities consumed by handlers
pub mod capabilities;

/// Error types
pub mod error;

/// Built-in action handlers
pub mod handlers;

/// Branch-recursive step interpreter
pub mod interpreter;

/// Audit log entries and sinks
pub mod logging;

/// Action handler trait and registry
pub mod registry;

/// Bounded retry
pub mod retry;

/// Run orchestration
pub mod runner;

/// Core types
pub mod types;

pub use capabilities::{AuditStore, JobOutcome, JobStatus, JobTrigger, PredicateEvaluator, Transform};
pub use domain::outcome::{ErrorInfo, ExecutionOutcome, RunSummary, StepStatus};
pub use domain::step::{Step, StepSequence, UNNAMED_STEP};
pub use error::CoreError;
pub use handlers::{standard_registry, BranchHandler, DelayHandler, TransformHandler, TriggerJobHandler};
pub use interpreter::{InterpreterConfig, StepInterpreter, Walk, DEFAULT_MAX_DEPTH};
pub use logging::{
    AppendFileWriter, ConsoleWriter, EntryWriter, FanOutLogSink, LogEntry, LogSink, MemoryWriter,
};
pub use registry::{ActionHandler, ActionRegistry, ActionRegistryBuilder, BranchArm, StepContext, StepEffect};
pub use retry::{RetryExecutor, RetryPolicy};
pub use runner::FlowRunner;
pub use types::{ActionKind, LogLevel};

/// Re-exported so callers can cancel runs without depending on `tokio-util` directly
pub use tokio_util::sync::CancellationToken;
