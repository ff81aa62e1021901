//! Audit logging.
//!
//! Every boundary of a run (flow start/end, step start/end, retries) produces a
//! [`LogEntry`] that is handed to a [`LogSink`]. The production sink,
//! [`FanOutLogSink`], writes each entry to a console writer and a durable
//! append-only writer, then forwards it to an optional [`AuditStore`].
//! None of this ever fails observably to the caller.
//!
//! Diagnostic output of the library itself goes through `tracing` and is
//! independent of the audit trail.

use crate::capabilities::AuditStore;
use crate::error::CoreError;
use crate::types::LogLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Default bound on a single audit store insert
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// One audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Name of the process document being run
    pub process_name: String,
    /// Step the entry is about, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    /// Message text
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(level: LogLevel, process_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            process_name: process_name.into(),
            step_name: None,
            message: message.into(),
        }
    }

    /// INFO entry
    pub fn info(process_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, process_name, message)
    }

    /// WARN entry
    pub fn warn(process_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, process_name, message)
    }

    /// ERROR entry
    pub fn error(process_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, process_name, message)
    }

    /// Attach the step the entry is about
    pub fn for_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    /// `process` or `process / step`
    pub fn source(&self) -> String {
        match &self.step_name {
            Some(step) => format!("{} / {}", self.process_name, step),
            None => self.process_name.clone(),
        }
    }
}

/// Destination for audit entries. Implementations must not fail observably.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Record one entry
    async fn write(&self, entry: LogEntry);
}

/// Synchronous stream an entry is written to (console, file, memory)
pub trait EntryWriter: Send + Sync {
    /// Write one entry
    fn write_entry(&self, entry: &LogEntry) -> Result<(), CoreError>;
}

/// Writes `[LEVEL] source - message` lines to stdout.
///
/// Lines go through a dedicated non-blocking worker; dropping the writer
/// flushes whatever is still queued.
pub struct ConsoleWriter {
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl ConsoleWriter {
    /// Writer for the process's standard output
    pub fn stdout() -> Self {
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(std::io::stdout());
        Self { writer, _guard: guard }
    }
}

impl std::fmt::Debug for ConsoleWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleWriter").finish_non_exhaustive()
    }
}

impl EntryWriter for ConsoleWriter {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), CoreError> {
        let line = format!("[{}] {} - {}\n", entry.level, entry.source(), entry.message);
        self.writer.clone().write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Append-only file writer; the durable audit stream.
///
/// Backed by a never-rotating [`RollingFileAppender`] so the file name stays
/// exactly as configured.
pub struct AppendFileWriter {
    path: PathBuf,
    file: Mutex<RollingFileAppender>,
}

impl AppendFileWriter {
    /// Open (creating parent directories and the file as needed) for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CoreError::ValidationError(format!("invalid log file path: {}", path.display())))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(&directory)
            .map_err(|e| CoreError::IOError(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            file: Mutex::new(appender),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for AppendFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendFileWriter").field("path", &self.path).finish()
    }
}

impl EntryWriter for AppendFileWriter {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), CoreError> {
        let line = format!(
            "{} - {} - {} | {}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level,
            entry.source(),
            entry.message
        );
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory stream; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryWriter {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries of one level
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

impl EntryWriter for MemoryWriter {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), CoreError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl LogSink for MemoryWriter {
    async fn write(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Console + durable stream, then the optional structured store.
pub struct FanOutLogSink {
    console: Box<dyn EntryWriter>,
    durable: Box<dyn EntryWriter>,
    store: Option<Arc<dyn AuditStore>>,
    store_timeout: Duration,
}

impl FanOutLogSink {
    /// Sink without a structured store
    pub fn new(console: Box<dyn EntryWriter>, durable: Box<dyn EntryWriter>) -> Self {
        Self {
            console,
            durable,
            store: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Forward entries to a structured store as well
    pub fn with_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bound on each store insert
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Whether a structured store is attached
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn write_local(&self, entry: &LogEntry) {
        if let Err(e) = self.console.write_entry(entry) {
            warn!(error = %e, "console audit writer failed");
        }
        if let Err(e) = self.durable.write_entry(entry) {
            warn!(error = %e, "durable audit writer failed");
        }
    }
}

#[async_trait]
impl LogSink for FanOutLogSink {
    async fn write(&self, entry: LogEntry) {
        self.write_local(&entry);

        let Some(store) = &self.store else {
            return;
        };

        let failure = match tokio::time::timeout(self.store_timeout, store.insert(&entry)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("insert timed out after {:?}", self.store_timeout)),
        };

        if let Some(reason) = failure {
            warn!(store = store.name(), %reason, "audit store write failed");
            let mut notice = LogEntry::warn(
                entry.process_name.clone(),
                format!("{} unavailable, entry not stored: {}", store.name(), reason),
            );
            notice.step_name = entry.step_name.clone();
            if let Err(e) = self.durable.write_entry(&notice) {
                warn!(error = %e, "durable audit writer failed");
            }
        }
    }
}
