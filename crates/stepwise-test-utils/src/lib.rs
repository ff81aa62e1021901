//! Testing utilities for Stepwise.
//!
//! Mocks of the boundary capabilities, scripted fakes for the common failure
//! shapes, sample process documents and assertions over run summaries.

pub mod assertions;
pub mod data_generators;
pub mod implementations;
pub mod mocks;

/// Re-export commonly used types for convenience
pub use mockall;

pub use assertions::{assert_counts, assert_visit_order, RunAssertionError};
pub use data_generators::{nested_branch_sequence, sample_process_json, sample_process_yaml};
pub use implementations::{FailingTrigger, FixedEvaluator, RecordingTransform};
pub use mocks::{MockAudit, MockEvaluator, MockTransformer, MockTrigger};
