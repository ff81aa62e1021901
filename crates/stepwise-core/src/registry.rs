//! Action handlers and the registry that maps action kinds to them.

use crate::domain::step::Step;
use crate::error::CoreError;
use crate::logging::LogSink;
use crate::retry::RetryPolicy;
use crate::types::ActionKind;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Which child sequence of a branch step to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchArm {
    /// `true_flow`
    True,
    /// `false_flow`
    False,
}

impl BranchArm {
    /// Arm selected by a predicate result
    pub fn from_condition(value: bool) -> Self {
        if value {
            BranchArm::True
        } else {
            BranchArm::False
        }
    }

    /// Field name of the arm in the process document
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchArm::True => "true_flow",
            BranchArm::False => "false_flow",
        }
    }
}

impl fmt::Display for BranchArm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler asks the interpreter to do after it returns
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    /// The step's work is done; the value (if any) becomes the step's output
    Completed(Option<Value>),
    /// Walk one of the step's child sequences
    Descend(BranchArm),
}

/// Read-only view of the run handed to a handler
pub struct StepContext<'a> {
    /// Name of the process being run
    pub process_name: &'a str,
    /// Branch nesting level of the step
    pub depth: usize,
    /// Predicate scope built from the outcomes recorded so far
    /// (`Null` for anything but branch steps)
    pub scope: &'a Value,
    /// Audit sink of the run
    pub sink: &'a Arc<dyn LogSink>,
    /// Cancellation token of the run
    pub cancel: &'a CancellationToken,
}

/// Performs the work for one action kind
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler serves
    fn kind(&self) -> ActionKind;

    /// Check the step's kind-specific fields before any attempt is made.
    /// Failures here are never retried.
    fn validate(&self, _step: &Step) -> Result<(), CoreError> {
        Ok(())
    }

    /// Retry policy to wrap [`ActionHandler::invoke`] in, if any
    fn retry_policy(&self, _step: &Step) -> Option<RetryPolicy> {
        None
    }

    /// Execute the step
    async fn invoke(&self, step: &Step, ctx: &StepContext<'_>) -> Result<StepEffect, CoreError>;
}

/// Fixed mapping from action kind to handler, frozen once built
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Start registering handlers
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// Handler for `kind`, or `None` when nothing is registered for it
    pub fn resolve(&self, kind: &ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(kind).cloned()
    }

    /// Registered kinds, in canonical-name order
    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.handlers.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Collects handlers at start-up
#[derive(Default)]
pub struct ActionRegistryBuilder {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionRegistryBuilder {
    /// Register a handler under its own kind, replacing any earlier one.
    /// Handlers claiming an unsupported kind are ignored.
    pub fn register(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        let kind = handler.kind();
        if !kind.is_supported() {
            warn!(kind = %kind, "ignoring handler for an action kind outside the built-in set");
            return self;
        }
        if self.handlers.insert(kind.clone(), handler).is_some() {
            debug!(kind = %kind, "replaced previously registered handler");
        }
        self
    }

    /// Freeze the registry
    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            handlers: self.handlers,
        }
    }
}
