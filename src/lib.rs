//! # Stepwise
//!
//! Runs declarative process documents: an ordered list of steps that trigger
//! orchestrator jobs, run transform modules, pause, or branch on a condition.
//! Every step boundary is written to an audit trail; failing steps are
//! recorded and their siblings still run.
//!
//! This crate wires the workspace together: [`RuntimeConfig`] decides which
//! capabilities are used, [`Stepwise`] builds the interpreter and runs
//! documents from disk.
//!
//! ```no_run
//! use stepwise::{RuntimeConfig, Stepwise};
//!
//! # async fn run() -> Result<(), stepwise::StepwiseError> {
//! let config = RuntimeConfig::load(None)?;
//! stepwise::telemetry::init_tracing(&config.logging);
//!
//! let stepwise = Stepwise::builder().config(config).build()?;
//! let summary = stepwise.run_file("process_flow.json").await?;
//! println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{AuditConfig, InterpreterSettings, LoggingConfig, RuntimeConfig};
pub use error::{StepwiseError, StepwiseResult};

pub use stepwise_core::{CancellationToken, LogEntry, LogSink, RunSummary, StepStatus};
pub use stepwise_dsl::ProcessDefinition;

use std::path::Path;
use std::sync::Arc;
use stepwise_core::{
    standard_registry, AppendFileWriter, AuditStore, ConsoleWriter, FanOutLogSink, FlowRunner, JobTrigger,
    PredicateEvaluator, StepInterpreter, Transform,
};
use stepwise_stdlib::{ExpressionEvaluator, OrchestratorClient, TransformRegistry};
use tracing::{info, warn};

/// A configured process runner
pub struct Stepwise {
    runner: FlowRunner,
    config: RuntimeConfig,
}

impl Stepwise {
    /// Start building a runner
    pub fn builder() -> StepwiseBuilder {
        StepwiseBuilder::default()
    }

    /// Configuration the runner was built with
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Token that cancels the current and every later run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.runner.cancellation_token()
    }

    /// Load a JSON or YAML process document and run it
    pub async fn run_file(&self, path: impl AsRef<Path>) -> StepwiseResult<RunSummary> {
        let path = path.as_ref();
        let definition = stepwise_dsl::load_process_file(path)?;
        info!(path = %path.display(), process = %definition.name, "process document loaded");
        Ok(self.run(&definition).await)
    }

    /// Run an already loaded process
    pub async fn run(&self, definition: &ProcessDefinition) -> RunSummary {
        self.runner.run(&definition.name, &definition.steps).await
    }
}

/// Builder for [`Stepwise`]; anything not supplied comes from the configuration
#[derive(Default)]
pub struct StepwiseBuilder {
    config: RuntimeConfig,
    sink: Option<Arc<dyn LogSink>>,
    audit_store: Option<Arc<dyn AuditStore>>,
    trigger: Option<Arc<dyn JobTrigger>>,
    transform: Option<Arc<dyn Transform>>,
    evaluator: Option<Arc<dyn PredicateEvaluator>>,
    cancel: Option<CancellationToken>,
}

impl StepwiseBuilder {
    /// Use this configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the whole audit sink (the log file and audit store settings are then unused)
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Forward audit entries to this store instead of the configured one
    pub fn audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(store);
        self
    }

    /// Use this job trigger instead of the orchestrator client
    pub fn job_trigger(mut self, trigger: Arc<dyn JobTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Use this transform instead of the built-in registry
    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Use this predicate evaluator instead of the expression evaluator
    pub fn evaluator(mut self, evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the runner.
    ///
    /// With the `database` feature and an enabled audit section this creates a
    /// lazily connecting pool, which must happen inside a tokio runtime.
    pub fn build(self) -> StepwiseResult<Stepwise> {
        let config = self.config;

        let sink: Arc<dyn LogSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(default_sink(&config, self.audit_store)?),
        };

        let trigger: Arc<dyn JobTrigger> = match self.trigger {
            Some(trigger) => trigger,
            None => Arc::new(OrchestratorClient::new(config.orchestrator.clone())?),
        };
        let transform: Arc<dyn Transform> = match self.transform {
            Some(transform) => transform,
            None => Arc::new(TransformRegistry::with_builtins()),
        };
        let evaluator: Arc<dyn PredicateEvaluator> = match self.evaluator {
            Some(evaluator) => evaluator,
            None => Arc::new(ExpressionEvaluator::new()),
        };

        let registry = standard_registry(trigger, transform, evaluator, config.interpreter.job_retry());
        let mut interpreter =
            StepInterpreter::new(registry, sink.clone()).with_config(config.interpreter.interpreter_config());
        if let Some(cancel) = self.cancel {
            interpreter = interpreter.with_cancellation(cancel);
        }

        Ok(Stepwise {
            runner: FlowRunner::new(interpreter, sink),
            config,
        })
    }
}

fn default_sink(config: &RuntimeConfig, store: Option<Arc<dyn AuditStore>>) -> StepwiseResult<FanOutLogSink> {
    let durable = AppendFileWriter::open(&config.logging.log_file)?;
    let sink = FanOutLogSink::new(Box::new(ConsoleWriter::stdout()), Box::new(durable))
        .with_store_timeout(config.audit.timeout());

    let store = match store {
        Some(store) => Some(store),
        None => configured_store(config)?,
    };

    Ok(match store {
        Some(store) => sink.with_store(store),
        None => sink,
    })
}

#[cfg(feature = "database")]
fn configured_store(config: &RuntimeConfig) -> StepwiseResult<Option<Arc<dyn AuditStore>>> {
    use stepwise_stdlib::{SqlAuditConfig, SqlAuditStore};

    if !config.audit.enabled {
        return Ok(None);
    }
    let Some(url) = &config.audit.database_url else {
        warn!("Audit store enabled without a database URL; skipping");
        return Ok(None);
    };

    let store = SqlAuditStore::connect_lazy(&SqlAuditConfig {
        connection_string: url.clone(),
        max_connections: 2,
        acquire_timeout_ms: config.audit.timeout_ms,
    })?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "database"))]
fn configured_store(config: &RuntimeConfig) -> StepwiseResult<Option<Arc<dyn AuditStore>>> {
    if config.audit.enabled {
        warn!("Audit store enabled but stepwise was built without the `database` feature; skipping");
    }
    Ok(None)
}

/// Returns a version string for the Stepwise crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
