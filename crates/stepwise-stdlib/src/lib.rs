//!
//! Standard capabilities for Stepwise
//!
//! The core interpreter only knows the [`JobTrigger`], [`Transform`],
//! [`PredicateEvaluator`] and [`AuditStore`] traits. This crate provides the
//! implementations used in production: an orchestrator client, a static
//! transform registry, a restricted condition evaluator and, behind the
//! `database` feature, a Postgres audit store.
//!

use std::sync::Arc;
use stepwise_core::{standard_registry, ActionRegistry, RetryPolicy};

pub mod components;

pub use components::condition::{ConditionError, ExpressionEvaluator, MAX_EXPRESSION_LENGTH, MAX_NESTING};
pub use components::orchestrator::{OrchestratorAuth, OrchestratorClient, OrchestratorConfig};
pub use components::transforms::{PreprocessCustomer, TransformModule, TransformRegistry, TransformRegistryBuilder};

#[cfg(feature = "database")]
pub use components::audit::{SqlAuditConfig, SqlAuditStore};

pub use stepwise_core::{AuditStore, JobTrigger, PredicateEvaluator, Transform};

/// Action registry wired with the standard capabilities
pub fn stdlib_registry(
    orchestrator: OrchestratorClient,
    transforms: TransformRegistry,
    job_retry: RetryPolicy,
) -> ActionRegistry {
    standard_registry(
        Arc::new(orchestrator),
        Arc::new(transforms),
        Arc::new(ExpressionEvaluator::new()),
        job_retry,
    )
}

/// Returns a version string for the Stepwise stdlib crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
