//! Bounded retry with a fixed pause between attempts.

use crate::error::CoreError;
use crate::logging::{LogEntry, LogSink};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How many times to attempt an operation and how long to pause in between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (0 is treated as 1)
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    2000
}

impl RetryPolicy {
    /// Policy with an explicit attempt count and pause
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Default for job-triggering actions: 3 attempts, 2 seconds apart
    pub fn job_default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// A single attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Effective number of attempts
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause between attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::job_default()
    }
}

/// Wraps a fallible async operation with a [`RetryPolicy`].
///
/// Every failed attempt is logged at ERROR; the pause only happens between
/// attempts, so `n` failing attempts produce `n - 1` pauses. When all
/// attempts fail the result is [`CoreError::RetryExhausted`] carrying the
/// final attempt's error unchanged.
pub struct RetryExecutor {
    policy: RetryPolicy,
    sink: Arc<dyn LogSink>,
    process_name: String,
    step_name: Option<String>,
    cancel: CancellationToken,
}

impl RetryExecutor {
    /// Executor logging to `sink`
    pub fn new(policy: RetryPolicy, sink: Arc<dyn LogSink>) -> Self {
        Self {
            policy,
            sink,
            process_name: "Retry".to_string(),
            step_name: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Name the process (and step) the retry log entries belong to
    pub fn with_context(mut self, process_name: impl Into<String>, step_name: Option<String>) -> Self {
        self.process_name = process_name.into();
        self.step_name = step_name;
        self
    }

    /// Abort pauses when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The policy in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op` until it succeeds or the attempts are used up
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, max_attempts, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(err) => err,
            };

            self.log_failure(attempt, max_attempts, &err).await;

            if attempt >= max_attempts {
                return Err(CoreError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(CoreError::Cancelled),
                _ = tokio::time::sleep(self.policy.delay()) => {}
            }
        }
    }

    async fn log_failure(&self, attempt: u32, max_attempts: u32, err: &CoreError) {
        let mut entry = LogEntry::error(
            self.process_name.clone(),
            format!("attempt {}/{} failed: {}", attempt, max_attempts, err),
        );
        entry.step_name = self.step_name.clone();
        self.sink.write(entry).await;
    }
}
