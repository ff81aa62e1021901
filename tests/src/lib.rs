// Stepwise end-to-end tests
//
// Shared harness for the scenarios under `e2e/`. Each harness owns its fakes
// and an in-memory audit sink so tests can assert on both.

use std::sync::Arc;
use stepwise::{RuntimeConfig, Stepwise};
use stepwise_core::{LogEntry, LogLevel, MemoryWriter};
use stepwise_dsl::{parse_process_document, DocumentFormat, ProcessDefinition};
use stepwise_test_utils::{FailingTrigger, RecordingTransform};

/// Pause between job retries in the harness, in milliseconds
pub const HARNESS_RETRY_DELAY_MS: u64 = 10;

/// A runner wired to recording fakes
pub struct Harness {
    pub stepwise: Stepwise,
    pub audit: MemoryWriter,
    pub trigger: Arc<FailingTrigger>,
    pub transform: Arc<RecordingTransform>,
}

impl Harness {
    /// Runner whose trigger fails `trigger_failures` times before starting jobs
    pub fn new(trigger_failures: u32, transform: RecordingTransform) -> Self {
        let mut config = RuntimeConfig::default();
        config.interpreter.job_retry_delay_ms = HARNESS_RETRY_DELAY_MS;
        Self::with_config(config, trigger_failures, transform)
    }

    /// Same as [`Harness::new`] with an explicit configuration
    pub fn with_config(config: RuntimeConfig, trigger_failures: u32, transform: RecordingTransform) -> Self {
        let audit = MemoryWriter::new();
        let trigger = Arc::new(FailingTrigger::new(trigger_failures));
        let transform = Arc::new(transform);

        let stepwise = Stepwise::builder()
            .config(config)
            .sink(Arc::new(audit.clone()))
            .job_trigger(trigger.clone())
            .transform(transform.clone())
            .build()
            .unwrap_or_else(|e| panic!("harness failed to build: {}", e));

        Self {
            stepwise,
            audit,
            trigger,
            transform,
        }
    }

    /// Audit entries of one level
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.audit.entries_at(level)
    }
}

/// Parse a JSON process document, panicking on malformed test input
pub fn json_process(text: &str) -> ProcessDefinition {
    parse_process_document(text, DocumentFormat::Json).unwrap_or_else(|e| panic!("bad test document: {}", e))
}
