//! Automatic schema synchronization from model definitions
//!
//! - Compares model definitions to the current database schema
//! - Creates missing tables (unique and foreign key constraints included)
//! - Adds missing columns to existing tables
//! - Creates indexes on foreign key columns
//! - Does NOT handle column renames or type changes (requires DB wipe)

use sqlx::Row;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::models::{
    Account, Company, Leave, LeaveBalance, Membership, Session, User, Verification,
};
use crate::orm::{ColumnDef, DatabaseSchema, Executor, SqlValue};

const MODEL: &str = "schema";

/// Result of a schema sync operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check if a table exists in the database
async fn table_exists(executor: &Executor, table_name: &str) -> Result<bool> {
    let row = executor
        .fetch_optional(
            MODEL,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlValue::String(table_name.to_string())],
        )
        .await?;
    Ok(row.is_some())
}

/// Get existing columns for a table
async fn get_table_columns(executor: &Executor, table_name: &str) -> Result<Vec<String>> {
    let rows = executor
        .fetch_all(MODEL, &format!("PRAGMA table_info({})", table_name), &[])
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, sqlx::Error>>()
        .map_err(|e| ClientError::from_sqlx(MODEL, e))
}

/// Run one DDL statement, recording a failure instead of aborting
async fn run_ddl(
    executor: &Executor,
    sql: &str,
    context: &str,
    result: &mut SchemaSyncResult,
) -> bool {
    debug!("{}: {}", context, sql);
    match executor.execute(MODEL, sql, &[]).await {
        Ok(_) => true,
        Err(e) => {
            let msg = format!("Failed to {}: {}", context, e);
            warn!("{}", msg);
            result.errors.push(msg);
            false
        }
    }
}

/// Sync a single model's table to the database
pub async fn sync_entity<E: DatabaseSchema>(executor: &Executor) -> Result<SchemaSyncResult> {
    let mut result = SchemaSyncResult::default();
    let table_name = E::TABLE_NAME;

    if !table_exists(executor, table_name).await? {
        let create_sql = E::create_table_sql();
        let context = format!("create table {}", table_name);
        if run_ddl(executor, &create_sql, &context, &mut result).await {
            info!("Created table: {}", table_name);
            result.tables_created.push(table_name.to_string());
        }
    } else {
        let existing_columns = get_table_columns(executor, table_name).await?;

        for col_def in E::columns() {
            if existing_columns.iter().any(|c| c == col_def.name) {
                continue;
            }

            let alter_sql = generate_add_column_sql(table_name, col_def);
            let context = format!("add column {}.{}", table_name, col_def.name);
            if !run_ddl(executor, &alter_sql, &context, &mut result).await {
                continue;
            }
            info!("Added column {}.{}", table_name, col_def.name);
            result
                .columns_added
                .push((table_name.to_string(), col_def.name.to_string()));

            // ADD COLUMN cannot carry UNIQUE; enforce it with an index instead
            if col_def.unique {
                let index_sql = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_{column} ON {table} ({column})",
                    table = table_name,
                    column = col_def.name
                );
                let context = format!("create unique index on {}.{}", table_name, col_def.name);
                run_ddl(executor, &index_sql, &context, &mut result).await;
            }
        }
    }

    for index_sql in E::index_sql() {
        let context = format!("create index on {}", table_name);
        run_ddl(executor, &index_sql, &context, &mut result).await;
    }

    Ok(result)
}

/// Generate ALTER TABLE ADD COLUMN SQL
fn generate_add_column_sql(table_name: &str, col: &ColumnDef) -> String {
    let sql_type = col.kind.sql_type();
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table_name, col.name, sql_type
    );

    // SQLite cannot add a NOT NULL column without a default
    if let Some(default) = col.default {
        if !col.nullable {
            sql.push_str(" NOT NULL");
        }
        sql.push_str(&format!(" DEFAULT {}", default));
    } else if !col.nullable {
        let default_val = match sql_type {
            "INTEGER" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {}", default_val));
    }

    sql
}

/// Sync every model table, parents before children.
pub async fn sync_all_entity_schemas(executor: &Executor) -> SchemaSyncResult {
    let mut total_result = SchemaSyncResult::default();

    macro_rules! sync_one {
        ($entity:ty) => {
            match sync_entity::<$entity>(executor).await {
                Ok(result) => total_result.merge(result),
                Err(e) => {
                    total_result.errors.push(format!(
                        "Error syncing {}: {}",
                        stringify!($entity),
                        e
                    ));
                }
            }
        };
    }

    // Auth
    sync_one!(User);
    sync_one!(Session);
    sync_one!(Account);
    sync_one!(Verification);

    // Tenancy
    sync_one!(Company);
    sync_one!(Membership);

    // Leave tracking
    sync_one!(Leave);
    sync_one!(LeaveBalance);

    if !total_result.tables_created.is_empty() || !total_result.columns_added.is_empty() {
        info!(
            tables = total_result.tables_created.len(),
            columns = total_result.columns_added.len(),
            "Schema synchronized"
        );
    }

    total_result
}
