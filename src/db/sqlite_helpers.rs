//! SQLite helper utilities for type conversion
//!
//! SQLite has no native timestamp or boolean type. This module converts
//! between Rust types and the TEXT/INTEGER encodings used by the tables.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::orm::DbEnum;

// ============================================================================
// Identifier Helpers
// ============================================================================

/// Generate a new record identifier
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Timestamp Helpers (stored as fixed-width RFC 3339 TEXT)
// ============================================================================

/// Get current UTC timestamp in the stored format
#[inline]
pub fn now_iso8601() -> String {
    datetime_to_str(Utc::now())
}

/// Convert a chrono DateTime to its stored form.
///
/// Millisecond precision with a `Z` suffix keeps every value the same width,
/// so string comparison in SQL matches chronological order.
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO8601 string to DateTime
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing SQLite's datetime() format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .map_err(|e| anyhow!("Invalid datetime '{}': {}", s, e))
        })
}

/// Parse an optional datetime string
#[inline]
pub fn str_to_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(str_to_datetime(s)?)),
        _ => Ok(None),
    }
}

// ============================================================================
// Boolean Helpers (SQLite uses 0/1 integers)
// ============================================================================

/// Convert bool to SQLite integer (0 or 1)
#[inline]
pub fn bool_to_int(b: bool) -> i64 {
    if b { 1 } else { 0 }
}

/// Convert SQLite integer to bool
#[inline]
pub fn int_to_bool(i: i64) -> bool {
    i != 0
}

// ============================================================================
// Row Decoding Helpers
// ============================================================================

fn decode_error(err: anyhow::Error) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

/// Read a required timestamp column
pub fn get_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    str_to_datetime(&raw).map_err(decode_error)
}

/// Read a nullable timestamp column
pub fn get_datetime_opt(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    str_to_datetime_opt(raw.as_deref()).map_err(decode_error)
}

/// Read an INTEGER column holding a boolean
pub fn get_bool(row: &SqliteRow, column: &str) -> Result<bool, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    Ok(int_to_bool(raw))
}

/// Read a TEXT column holding an enum label
pub fn get_enum<E: DbEnum>(row: &SqliteRow, column: &str) -> Result<E, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    E::from_db_str(&raw)
        .ok_or_else(|| decode_error(anyhow!("Unknown value '{}' in column {}", raw, column)))
}
