//! Core traits for the ORM layer
//!
//! Every model in `crate::models` implements these traits; the generic
//! [`Delegate`](super::Delegate) only talks to models through them.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteArguments, SqliteRow};

use super::args::OrderBy;
use super::builder::SqlFragment;
use super::executor::Executor;
use super::update::Assignments;
use crate::db::sqlite_helpers::{bool_to_int, datetime_to_str};
use crate::error::Result;

/// Storage class of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    /// INTEGER 0/1
    Boolean,
    Real,
    /// Fixed-width RFC 3339 TEXT
    DateTime,
    /// UPPER_SNAKE TEXT label
    Enum,
}

impl FieldKind {
    /// SQLite column type
    pub const fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::DateTime | FieldKind::Enum => "TEXT",
            FieldKind::Boolean => "INTEGER",
            FieldKind::Real => "REAL",
        }
    }

    /// Whether `avg`/`sum` make sense on the field
    pub const fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Real)
    }
}

/// Column definition for schema generation.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    pub kind: FieldKind,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Single-column unique constraint
    pub unique: bool,
    /// Default value expression (e.g., `'PENDING'`)
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            is_primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default_value(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.kind.sql_type());

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if self.unique {
            sql.push_str(" UNIQUE");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        sql
    }
}

/// Referential action applied when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    pub const fn to_sql(self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

/// Foreign key from a column of this table to another table
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
    pub referenced_column: &'static str,
    pub on_delete: OnDelete,
}

impl ForeignKey {
    pub const fn new(column: &'static str, references: &'static str, on_delete: OnDelete) -> Self {
        Self {
            column,
            references,
            referenced_column: "id",
            on_delete,
        }
    }

    pub fn to_sql(&self) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
            self.column,
            self.references,
            self.referenced_column,
            self.on_delete.to_sql()
        )
    }
}

/// Metadata about a database entity (table).
pub trait DatabaseEntity: Sized + Send + Sync {
    /// The SQL table name (e.g., "leave_balances")
    const TABLE_NAME: &'static str;

    /// The primary key column name
    const PRIMARY_KEY: &'static str = "id";

    /// Column filled with the insert time when the caller leaves it out
    const CREATED_AT: Option<&'static str> = Some("created_at");

    /// Column refreshed on every update that changes something
    const UPDATED_AT: Option<&'static str> = Some("updated_at");

    /// `table.column`, the form every generated condition uses
    fn qualified(column: &str) -> String {
        format!("{}.{}", Self::TABLE_NAME, column)
    }
}

/// Trait for database schema generation and migration.
pub trait DatabaseSchema: DatabaseEntity {
    /// Get all column definitions for this entity's table
    fn columns() -> &'static [ColumnDef];

    /// Multi-column unique constraints
    fn unique_constraints() -> &'static [&'static [&'static str]] {
        &[]
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        &[]
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    fn create_table_sql() -> String {
        let mut parts: Vec<String> = Self::columns().iter().map(|c| c.to_sql()).collect();

        for columns in Self::unique_constraints() {
            parts.push(format!("UNIQUE ({})", columns.join(", ")));
        }

        for fk in Self::foreign_keys() {
            parts.push(fk.to_sql());
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            parts.join(",\n  ")
        )
    }

    /// Indexes on foreign key columns
    fn index_sql() -> Vec<String> {
        Self::foreign_keys()
            .iter()
            .map(|fk| {
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
                    table = Self::TABLE_NAME,
                    column = fk.column
                )
            })
            .collect()
    }

    /// Get column names that exist in the entity definition
    fn defined_column_names() -> Vec<&'static str> {
        Self::columns().iter().map(|c| c.name).collect()
    }

    /// Qualified select list, e.g. `users.id AS id, users.name AS name`
    fn select_list() -> String {
        Self::columns()
            .iter()
            .map(|c| format!("{}.{} AS {}", Self::TABLE_NAME, c.name, c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Trait for decoding a database row into an entity.
pub trait FromSqlRow: Sized {
    /// Decode a SQLite row into this entity type
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Trait for applying filters to a SQL query.
///
/// Implemented by the `*WhereInput` structs and `*WhereUniqueInput` enums.
pub trait DatabaseFilter: Send + Sync {
    /// Conditions (ANDed together) and the values bound to their
    /// placeholders, in textual order.
    fn to_fragment(&self) -> SqlFragment;

    fn to_sql_conditions(&self) -> (Vec<String>, Vec<SqlValue>) {
        let fragment = self.to_fragment();
        (fragment.clauses, fragment.values)
    }

    /// Check if the filter has any conditions
    fn is_empty(&self) -> bool {
        self.to_fragment().is_empty()
    }
}

/// Represents a SQL value that can be bound to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(bool_to_int(*b)),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

/// Conversion of a Rust value into a bindable [`SqlValue`]
pub trait ToSqlValue {
    fn to_sql_value(&self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.to_string())
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.clone())
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(datetime_to_str(*self))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    fn to_sql_value(&self) -> SqlValue {
        (**self).to_sql_value()
    }
}

/// A fieldless enum stored as its UPPER_SNAKE label.
///
/// Implemented by `#[derive(DbEnum)]` from `leave-macros`.
pub trait DbEnum: Copy + Debug + PartialEq + Send + Sync + 'static {
    const VARIANTS: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn from_db_str(value: &str) -> Option<Self>;
}

/// A model's scalar field selector.
///
/// Generated by the `model_fields!` macro.
pub trait ScalarField: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn column(self) -> &'static str;

    fn kind(self) -> FieldKind;

    fn nullable(self) -> bool;
}

/// Column/value pairs written by an INSERT
pub trait InsertValues: Send + Sync {
    /// Caller-supplied primary key, generated when `None`
    fn id(&self) -> Option<&str>;

    /// Every other column the caller set. Columns left out take their
    /// database default.
    fn values(&self) -> Vec<(&'static str, SqlValue)>;
}

/// SET clause of an UPDATE
pub trait UpdateValues: Send + Sync {
    fn assignments(&self) -> Assignments;
}

/// A queryable model with typed inputs.
#[async_trait]
pub trait Model:
    DatabaseSchema + FromSqlRow + Clone + Debug + Send + Sync + Unpin + 'static
{
    /// Model name used in errors and logs
    const NAME: &'static str;

    type Field: ScalarField;
    type Where: DatabaseFilter + Default + Clone + Debug + 'static;
    type WhereUnique: DatabaseFilter + Clone + Debug + 'static;
    type Create: InsertValues + Clone + Debug + 'static;
    type Update: UpdateValues + Default + Clone + Debug + 'static;
    type Include: Default + Clone + Debug + Send + Sync + 'static;

    /// The primary key field
    const ID_FIELD: Self::Field;

    /// Ordering applied when a query names none
    const DEFAULT_ORDER: OrderBy<Self::Field>;

    fn id(&self) -> &str;

    /// Current value of a scalar field
    fn value(&self, field: Self::Field) -> SqlValue;

    /// Fill the relation fields selected by `include` on every record,
    /// one query per relation.
    async fn load_relations(
        _records: &mut [Self],
        _executor: &Executor,
        _include: &Self::Include,
    ) -> Result<()> {
        Ok(())
    }
}
