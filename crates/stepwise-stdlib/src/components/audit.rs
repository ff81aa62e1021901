//! Postgres-backed audit store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use stepwise_core::{AuditStore, CoreError, LogEntry};
use tracing::info;

const INSERT_ENTRY: &str =
    "INSERT INTO logs (log_date, level, process_name, step_name, message) VALUES ($1, $2, $3, $4, $5)";

/// Connection settings for [`SqlAuditStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlAuditConfig {
    /// Postgres connection string
    pub connection_string: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in milliseconds
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    2
}

fn default_acquire_timeout_ms() -> u64 {
    3_000
}

/// Writes audit entries as rows of the `logs` table
#[derive(Clone)]
pub struct SqlAuditStore {
    pool: PgPool,
}

impl SqlAuditStore {
    /// Build a lazily connecting pool; no connection is made until the first insert
    pub fn connect_lazy(config: &SqlAuditConfig) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_lazy(&config.connection_string)
            .map_err(|e| CoreError::ConfigurationError(format!("Invalid audit database URL: {}", e)))?;

        info!(max_connections = config.max_connections, "SQL audit store configured");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuditStore for SqlAuditStore {
    fn name(&self) -> &str {
        "sql"
    }

    async fn insert(&self, entry: &LogEntry) -> Result<(), CoreError> {
        sqlx::query(INSERT_ENTRY)
            .bind(entry.timestamp)
            .bind(entry.level.as_str())
            .bind(&entry.process_name)
            .bind(entry.step_name.as_deref())
            .bind(&entry.message)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::ExternalDependencyError(format!("audit insert failed: {}", e)))?;
        Ok(())
    }
}
