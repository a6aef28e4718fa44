//! Interactive transactions

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::executor::{Executor, begin_immediate};
use crate::error::ClientError;

/// Transaction isolation levels accepted by the API.
///
/// SQLite transactions are always serializable, so any other level is
/// rejected instead of silently weakened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "ReadUncommitted",
            IsolationLevel::ReadCommitted => "ReadCommitted",
            IsolationLevel::RepeatableRead => "RepeatableRead",
            IsolationLevel::Snapshot => "Snapshot",
            IsolationLevel::Serializable => "Serializable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Maximum time to wait for the transaction to start
    pub max_wait: Duration,
    /// Maximum time the callback may run before the transaction is rolled back
    pub timeout: Duration,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2000),
            timeout: Duration::from_millis(5000),
            isolation_level: None,
        }
    }
}

impl TransactionOptions {
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

/// Run `f` in a transaction on `executor`.
///
/// Commits when `f` returns `Ok`, rolls back on `Err` or when `f` outlives
/// `options.timeout`. Inside an open transaction `f` joins it and the
/// outer call decides the outcome.
pub(crate) async fn run<T, E, F, Fut>(
    executor: &Executor,
    options: &TransactionOptions,
    f: F,
) -> Result<T, E>
where
    F: FnOnce(Executor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ClientError>,
{
    match options.isolation_level {
        None | Some(IsolationLevel::Serializable) => {}
        Some(level) => {
            return Err(ClientError::UnsupportedIsolationLevel(level.as_str()).into());
        }
    }

    let pool = match executor {
        Executor::Transaction(_) => return f(executor.clone()).await,
        Executor::Pool(pool) => pool,
    };

    let tx = match tokio::time::timeout(options.max_wait, begin_immediate(pool)).await {
        Ok(begun) => begun.map_err(|e| ClientError::from_sqlx("transaction", e))?,
        Err(_) => {
            warn!(max_wait = ?options.max_wait, "Transaction could not start in time");
            return Err(ClientError::TransactionStart(options.max_wait).into());
        }
    };
    debug!("Transaction started");

    let scoped = Executor::from_transaction(tx);
    match tokio::time::timeout(options.timeout, f(scoped.clone())).await {
        Ok(Ok(value)) => {
            scoped.commit().await?;
            Ok(value)
        }
        Ok(Err(err)) => {
            scoped.rollback_quietly().await;
            Err(err)
        }
        Err(_) => {
            warn!(timeout = ?options.timeout, "Transaction timed out, rolling back");
            scoped.rollback_quietly().await;
            Err(ClientError::TransactionTimeout(options.timeout).into())
        }
    }
}
