//! # Stepwise DSL
//!
//! Process documents describe a named, ordered list of steps, each selecting
//! an action (`trigger-job`, `transform`, `delay` or `branch`). This crate
//! reads them from JSON or YAML and turns them into the core
//! [`StepSequence`] the interpreter walks.
//!
//! ## Example
//!
//! ```
//! use stepwise_dsl::{parse_process_document, DocumentFormat};
//!
//! let json = r#"{
//!   "name": "DMS Service Flow",
//!   "steps": [
//!     { "name": "Preprocess Customer", "action": "transform",
//!       "module": "preprocess_customer",
//!       "parameters": { "customer": { "name": "ali" } } },
//!     { "name": "Trigger CreateService", "action": "trigger-job",
//!       "bot_name": "CreateServiceJob" },
//!     { "name": "Wait Short", "action": "delay", "seconds": 1 }
//!   ]
//! }"#;
//!
//! let definition = parse_process_document(json, DocumentFormat::Json).unwrap();
//! assert_eq!(definition.name, "DMS Service Flow");
//! assert_eq!(definition.steps.len(), 3);
//! ```

mod error;
mod parser;

pub mod document;

pub use document::{FlowArm, ProcessDocument, StepDocument, UNNAMED_PROCESS};
pub use error::DslError;
pub use parser::{load_process_file, parse_process_document, DocumentFormat};

use stepwise_core::StepSequence;

/// A loaded process: its name and root step sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDefinition {
    /// Process name used in every audit entry of a run
    pub name: String,
    /// Root sequence
    pub steps: StepSequence,
}

/// Returns a version string for the Stepwise DSL crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
