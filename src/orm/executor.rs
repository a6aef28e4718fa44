//! Query execution against the pool or an open transaction

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Sqlite, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::traits::SqlValue;
use crate::error::{ClientError, Result};

type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

/// Where statements run.
///
/// A transaction executor is shared by every clone of a transaction-bound
/// client; once committed or rolled back the slot is empty and further
/// queries fail with [`ClientError::TransactionClosed`].
#[derive(Clone)]
pub enum Executor {
    Pool(SqlitePool),
    Transaction(SharedTransaction),
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Pool(_) => f.write_str("Executor::Pool"),
            Executor::Transaction(_) => f.write_str("Executor::Transaction"),
        }
    }
}

fn closed() -> ClientError {
    ClientError::TransactionClosed(
        "the transaction was already committed or rolled back".to_string(),
    )
}

fn bind_all<'q>(
    sql: &'q str,
    values: &'q [SqlValue],
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    values
        .iter()
        .fold(sqlx::query(sql), |query, value| value.bind_to_query(query))
}

/// Open a write transaction on `pool`.
///
/// `BEGIN IMMEDIATE` takes the write lock up front; concurrent writers
/// wait on the connection's busy timeout.
pub(crate) async fn begin_immediate(
    pool: &SqlitePool,
) -> sqlx::Result<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

impl Executor {
    pub fn from_transaction(tx: Transaction<'static, Sqlite>) -> Self {
        Executor::Transaction(Arc::new(Mutex::new(Some(tx))))
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    pub fn pool(&self) -> Option<&SqlitePool> {
        match self {
            Executor::Pool(pool) => Some(pool),
            Executor::Transaction(_) => None,
        }
    }

    pub async fn fetch_all(
        &self,
        model: &'static str,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<SqliteRow>> {
        debug!(model, sql, params = values.len(), "fetch_all");
        let query = bind_all(sql, values);
        let result = match self {
            Executor::Pool(pool) => query.fetch_all(pool).await,
            Executor::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or_else(closed)?;
                query.fetch_all(&mut **conn).await
            }
        };
        result.map_err(|e| ClientError::from_sqlx(model, e))
    }

    pub async fn fetch_optional(
        &self,
        model: &'static str,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Option<SqliteRow>> {
        debug!(model, sql, params = values.len(), "fetch_optional");
        let query = bind_all(sql, values);
        let result = match self {
            Executor::Pool(pool) => query.fetch_optional(pool).await,
            Executor::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or_else(closed)?;
                query.fetch_optional(&mut **conn).await
            }
        };
        result.map_err(|e| ClientError::from_sqlx(model, e))
    }

    pub async fn fetch_one(
        &self,
        model: &'static str,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<SqliteRow> {
        debug!(model, sql, params = values.len(), "fetch_one");
        let query = bind_all(sql, values);
        let result = match self {
            Executor::Pool(pool) => query.fetch_one(pool).await,
            Executor::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or_else(closed)?;
                query.fetch_one(&mut **conn).await
            }
        };
        result.map_err(|e| ClientError::from_sqlx(model, e))
    }

    /// Run a statement, returning the number of affected rows
    pub async fn execute(&self, model: &'static str, sql: &str, values: &[SqlValue]) -> Result<u64> {
        debug!(model, sql, params = values.len(), "execute");
        let query = bind_all(sql, values);
        let result = match self {
            Executor::Pool(pool) => query.execute(pool).await,
            Executor::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or_else(closed)?;
                query.execute(&mut **conn).await
            }
        };
        result
            .map(|done| done.rows_affected())
            .map_err(|e| ClientError::from_sqlx(model, e))
    }

    /// Commit the open transaction. A no-op on the pool.
    pub async fn commit(&self) -> Result<()> {
        let Executor::Transaction(slot) = self else {
            return Ok(());
        };
        let tx = slot.lock().await.take().ok_or_else(closed)?;
        tx.commit()
            .await
            .map_err(|e| ClientError::from_sqlx("transaction", e))?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Roll back the open transaction. A no-op on the pool.
    pub async fn rollback(&self) -> Result<()> {
        let Executor::Transaction(slot) = self else {
            return Ok(());
        };
        let tx = slot.lock().await.take().ok_or_else(closed)?;
        tx.rollback()
            .await
            .map_err(|e| ClientError::from_sqlx("transaction", e))?;
        debug!("Transaction rolled back");
        Ok(())
    }

    pub(crate) async fn rollback_quietly(&self) {
        if let Err(e) = self.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
    }

    /// Run `f` inside a transaction.
    ///
    /// On the pool a new transaction is opened and committed when `f`
    /// succeeds; inside a transaction `f` simply joins it.
    pub async fn atomically<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Executor) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Executor::Pool(pool) = self else {
            return f(self.clone()).await;
        };

        let tx = begin_immediate(pool)
            .await
            .map_err(|e| ClientError::from_sqlx("transaction", e))?;
        let scoped = Executor::from_transaction(tx);

        match f(scoped.clone()).await {
            Ok(value) => {
                scoped.commit().await?;
                Ok(value)
            }
            Err(err) => {
                scoped.rollback_quietly().await;
                Err(err)
            }
        }
    }
}
