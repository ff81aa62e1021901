//! One full run of a process document.

use crate::domain::outcome::RunSummary;
use crate::domain::step::StepSequence;
use crate::interpreter::StepInterpreter;
use crate::logging::{LogEntry, LogSink};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Brackets an interpreter walk with start/end markers and tallies the result.
///
/// A summary is always returned, even when every step fails.
pub struct FlowRunner {
    interpreter: StepInterpreter,
    sink: Arc<dyn LogSink>,
}

impl FlowRunner {
    /// Runner writing its markers to `sink`
    pub fn new(interpreter: StepInterpreter, sink: Arc<dyn LogSink>) -> Self {
        Self { interpreter, sink }
    }

    /// Runner writing its markers to the interpreter's own sink
    pub fn from_interpreter(interpreter: StepInterpreter) -> Self {
        let sink = interpreter.sink();
        Self::new(interpreter, sink)
    }

    /// Token that cancels runs started by this runner
    pub fn cancellation_token(&self) -> CancellationToken {
        self.interpreter.cancellation_token()
    }

    /// Execute `steps` as the process `process_name`
    pub async fn run(&self, process_name: &str, steps: &StepSequence) -> RunSummary {
        let started_at = Utc::now();
        self.sink.write(LogEntry::info(process_name, "flow started")).await;

        let walk = self.interpreter.execute(process_name, steps).await;
        let summary = RunSummary::from_outcomes(process_name, walk.outcomes, walk.cancelled, started_at);

        let mut message = format!(
            "flow completed: {} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        if summary.cancelled {
            message.push_str(" (cancelled)");
        }
        self.sink.write(LogEntry::info(process_name, message)).await;

        info!(
            run_id = %summary.run_id,
            process = process_name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "run finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryWriter;
    use crate::registry::ActionRegistry;
    use crate::types::LogLevel;
    use crate::Step;

    #[tokio::test]
    async fn test_markers_bracket_the_run() {
        let sink = MemoryWriter::new();
        let interpreter = StepInterpreter::new(ActionRegistry::default(), Arc::new(sink.clone()));
        let runner = FlowRunner::from_interpreter(interpreter);

        let summary = runner
            .run("DMS Flow", &StepSequence::new(vec![Step::new("future", "noop-future")]))
            .await;

        assert_eq!((summary.succeeded, summary.failed, summary.skipped), (0, 0, 1));
        let entries = sink.entries();
        assert_eq!(entries.first().unwrap().message, "flow started");
        assert_eq!(
            entries.last().unwrap().message,
            "flow completed: 0 succeeded, 0 failed, 1 skipped"
        );
        assert_eq!(sink.entries_at(LogLevel::Warn).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_sequence_still_summarised() {
        let sink = MemoryWriter::new();
        let runner = FlowRunner::new(
            StepInterpreter::new(ActionRegistry::default(), Arc::new(MemoryWriter::new())),
            Arc::new(sink.clone()),
        );

        let summary = runner.run("empty", &StepSequence::default()).await;

        assert!(summary.is_clean());
        assert!(summary.outcomes.is_empty());
        assert_eq!(sink.entries().len(), 2);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_flagged() {
        let sink = MemoryWriter::new();
        let runner = FlowRunner::from_interpreter(StepInterpreter::new(
            ActionRegistry::default(),
            Arc::new(sink.clone()),
        ));
        runner.cancellation_token().cancel();

        let summary = runner
            .run("flow", &StepSequence::new(vec![Step::new("wait", "delay")]))
            .await;

        assert!(summary.cancelled);
        assert!(!summary.is_clean());
        assert!(sink.entries().last().unwrap().message.ends_with("(cancelled)"));
    }
}
