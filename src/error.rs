//! Client error type
//!
//! Every delegate operation returns [`ClientError`]. Variants carry the
//! error codes used by the query-engine protocol the client mirrors, so
//! callers that already match on `P2002`/`P2025` keep working.

use std::time::Duration;

use sqlx::error::ErrorKind;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// `*_or_throw`, `update` and `delete` on a missing record
    #[error("No {model} record was found for a {operation} operation")]
    RecordNotFound {
        model: &'static str,
        operation: &'static str,
    },

    #[error("Unique constraint failed on {model} fields: ({})", .fields.join(", "))]
    UniqueConstraint {
        model: &'static str,
        fields: Vec<String>,
    },

    #[error("Foreign key constraint failed on {model}: {message}")]
    ForeignKeyConstraint { model: &'static str, message: String },

    #[error("Null constraint violation on {model}: {message}")]
    NullConstraint { model: &'static str, message: String },

    /// Arguments that can be typed but not executed (avg over a text field, ...)
    #[error("Invalid {model} query: {message}")]
    Validation { model: &'static str, message: String },

    #[error("Transaction already closed: {0}")]
    TransactionClosed(String),

    #[error("Transaction exceeded its timeout of {0:?} and was rolled back")]
    TransactionTimeout(Duration),

    #[error("Unable to start a transaction within {0:?}")]
    TransactionStart(Duration),

    /// The database stayed locked by another writer past the busy timeout
    #[error("Transaction failed due to a write conflict on {model}: {message}")]
    TransactionConflict { model: &'static str, message: String },

    #[error("Isolation level {0} is not supported by SQLite")]
    UnsupportedIsolationLevel(&'static str),

    #[error("Timed out fetching a connection from the pool")]
    PoolTimeout,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl ClientError {
    /// Engine-compatible error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::RecordNotFound { .. } => "P2025",
            Self::UniqueConstraint { .. } => "P2002",
            Self::ForeignKeyConstraint { .. } => "P2003",
            Self::NullConstraint { .. } => "P2011",
            Self::Validation { .. } => "P2009",
            Self::TransactionClosed(_)
            | Self::TransactionTimeout(_)
            | Self::TransactionStart(_)
            | Self::UnsupportedIsolationLevel(_) => "P2028",
            Self::TransactionConflict { .. } => "P2034",
            Self::PoolTimeout => "P2024",
            Self::Database(_) => "P2010",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    pub fn not_found(model: &'static str, operation: &'static str) -> Self {
        Self::RecordNotFound { model, operation }
    }

    pub fn validation(model: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            model,
            message: message.into(),
        }
    }

    /// Classify an sqlx error raised while operating on `model`.
    pub fn from_sqlx(model: &'static str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => Self::UniqueConstraint {
                        model,
                        fields: constraint_fields(&message),
                    },
                    ErrorKind::ForeignKeyViolation => {
                        Self::ForeignKeyConstraint { model, message }
                    }
                    ErrorKind::NotNullViolation => Self::NullConstraint { model, message },
                    _ if is_lock_error(db_err.code().as_deref()) => {
                        Self::TransactionConflict { model, message }
                    }
                    _ => Self::Database(sqlx::Error::Database(db_err)),
                }
            }
            other => Self::Database(other),
        }
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx("unknown", err)
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including their extended codes
fn is_lock_error(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

/// Extract column names from "UNIQUE constraint failed: users.email, users.name".
fn constraint_fields(message: &str) -> Vec<String> {
    message
        .split_once(':')
        .map(|(_, columns)| {
            columns
                .split(',')
                .map(|c| {
                    let c = c.trim();
                    c.rsplit_once('.').map_or(c, |(_, column)| column).to_string()
                })
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
