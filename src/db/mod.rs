//! Database client: connection, delegates and transactions

pub mod schema_sync;
pub mod seed;
pub mod sqlite_helpers;

use std::future::Future;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::models::{
    AccountDelegate, CompanyDelegate, LeaveBalanceDelegate, LeaveDelegate, MembershipDelegate,
    SessionDelegate, UserDelegate, VerificationDelegate,
};
use crate::orm::transaction;
use crate::orm::{Delegate, Executor, SqlValue, TransactionOptions};

pub use schema_sync::SchemaSyncResult;
pub use seed::{SeedResult, run_seeds};

/// Typed client over a SQLite pool.
///
/// Cloning is cheap. A client handed to a [`transaction`](Self::transaction)
/// callback runs every statement inside that transaction.
#[derive(Clone, Debug)]
pub struct Database {
    executor: Executor,
    transaction_defaults: TransactionOptions,
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl Database {
    /// Create a new client from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            executor: Executor::Pool(pool),
            transaction_defaults: TransactionOptions::default(),
        }
    }

    /// Open the pool described by `config`, syncing the schema when enabled
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = config.database_url.as_str();
        let in_memory = is_in_memory(url);

        let mut options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
            if let Some(parent) = options.get_filename().parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        info!(url, max_connections = config.max_connections, "Connected to database");

        let db = Self {
            executor: Executor::Pool(pool),
            transaction_defaults: config.transaction.clone(),
        };

        if config.auto_sync_schema {
            let result = db.sync_schema().await;
            for error in &result.errors {
                warn!(error = %error, "Schema sync error");
            }
        }

        Ok(db)
    }

    /// Connect with default settings to `url`
    pub async fn connect_url(url: &str) -> Result<Self> {
        let config = Config {
            database_url: url.to_string(),
            ..Config::default()
        };
        Self::connect(&config).await
    }

    /// Override the options used by [`transaction`](Self::transaction)
    pub fn with_transaction_defaults(mut self, options: TransactionOptions) -> Self {
        self.transaction_defaults = options;
        self
    }

    /// The underlying pool; `None` on a transaction-bound client
    pub fn pool(&self) -> Option<&SqlitePool> {
        self.executor.pool()
    }

    pub fn is_transaction(&self) -> bool {
        self.executor.is_transaction()
    }

    fn delegate<M: crate::orm::Model>(&self) -> Delegate<M> {
        Delegate::new(self.executor.clone())
    }

    pub fn users(&self) -> UserDelegate {
        self.delegate()
    }

    pub fn sessions(&self) -> SessionDelegate {
        self.delegate()
    }

    pub fn accounts(&self) -> AccountDelegate {
        self.delegate()
    }

    pub fn verifications(&self) -> VerificationDelegate {
        self.delegate()
    }

    pub fn companies(&self) -> CompanyDelegate {
        self.delegate()
    }

    pub fn memberships(&self) -> MembershipDelegate {
        self.delegate()
    }

    pub fn leaves(&self) -> LeaveDelegate {
        self.delegate()
    }

    pub fn leave_balances(&self) -> LeaveBalanceDelegate {
        self.delegate()
    }

    /// Run `f` in an interactive transaction with the client's default options.
    ///
    /// `f` receives a client bound to the transaction. It commits when `f`
    /// returns `Ok` and rolls back otherwise. Called on a client that is
    /// already inside a transaction, `f` joins the outer one.
    pub async fn transaction<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ClientError>,
    {
        let options = self.transaction_defaults.clone();
        self.transaction_with(options, f).await
    }

    /// [`transaction`](Self::transaction) with explicit options
    pub async fn transaction_with<T, E, F, Fut>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ClientError>,
    {
        let defaults = self.transaction_defaults.clone();
        transaction::run(&self.executor, &options, move |executor| {
            f(Database {
                executor,
                transaction_defaults: defaults,
            })
        })
        .await
    }

    /// Create missing tables, columns and indexes
    pub async fn sync_schema(&self) -> SchemaSyncResult {
        schema_sync::sync_all_entity_schemas(&self.executor).await
    }

    /// Run a raw statement, returning the number of affected rows
    pub async fn execute_raw(&self, sql: &str, values: &[SqlValue]) -> crate::error::Result<u64> {
        self.executor.execute("raw", sql, values).await
    }

    /// Close the pool. A transaction-bound client only drops its handle.
    pub async fn disconnect(self) {
        if let Some(pool) = self.executor.pool() {
            pool.close().await;
            info!("Database disconnected");
        }
    }
}
