//! Client configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::orm::TransactionOptions;

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL (`sqlite://path/to/file.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Maximum size of the connection pool
    pub max_connections: u32,

    /// How long a connection waits on a locked database before failing
    pub busy_timeout: Duration,

    /// Defaults for interactive transactions
    pub transaction: TransactionOptions,

    /// Create/extend tables on connect
    pub auto_sync_schema: bool,

    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/leave.db".to_string(),
            max_connections: 10,
            busy_timeout: Duration::from_millis(5000),
            transaction: TransactionOptions::default(),
            auto_sync_schema: true,
            log_filter: "leave_client=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // DATABASE_PATH takes a bare file path, DATABASE_URL a full URL
        let database_url = match (lookup("DATABASE_PATH"), lookup("DATABASE_URL")) {
            (Some(path), _) => format!("sqlite://{}", path),
            (None, Some(url)) => url,
            (None, None) => defaults.database_url,
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            None => defaults.max_connections,
        };

        let busy_timeout = match lookup("DATABASE_BUSY_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(
                value.parse().context("Invalid DATABASE_BUSY_TIMEOUT_MS")?,
            ),
            None => defaults.busy_timeout,
        };

        let mut transaction = defaults.transaction;
        if let Some(value) = lookup("TRANSACTION_MAX_WAIT_MS") {
            transaction.max_wait =
                Duration::from_millis(value.parse().context("Invalid TRANSACTION_MAX_WAIT_MS")?);
        }
        if let Some(value) = lookup("TRANSACTION_TIMEOUT_MS") {
            transaction.timeout =
                Duration::from_millis(value.parse().context("Invalid TRANSACTION_TIMEOUT_MS")?);
        }

        Ok(Self {
            database_url,
            max_connections,
            busy_timeout,
            transaction,
            auto_sync_schema: lookup("AUTO_SYNC_SCHEMA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.auto_sync_schema),
            log_filter: lookup("LOG_FILTER").unwrap_or(defaults.log_filter),
        })
    }
}
