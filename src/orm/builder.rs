//! SQL query builder
//!
//! Builds parameterized statements for one table. Placeholders are
//! anonymous `?` markers; values are kept in the textual order of the
//! clauses that reference them, so fragments can be concatenated freely.

use std::marker::PhantomData;

use super::traits::{DatabaseFilter, DatabaseSchema, SqlValue};
use super::update::Assignments;

/// A list of conditions plus the values bound to their placeholders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub clauses: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.values.extend(values);
    }

    pub fn append(&mut self, other: SqlFragment) {
        self.clauses.extend(other.clauses);
        self.values.extend(other.values);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// All clauses ANDed into one parenthesised condition
    pub fn conjunction(self) -> Option<(String, Vec<SqlValue>)> {
        if self.clauses.is_empty() {
            return None;
        }
        Some((format!("({})", self.clauses.join(" AND ")), self.values))
    }
}

/// `column IN (?, ?, ...)` over string keys
pub fn in_fragment(column: &str, keys: &[String]) -> SqlFragment {
    let mut fragment = SqlFragment::new();
    if keys.is_empty() {
        fragment.push("0 = 1", []);
    } else {
        let placeholders = vec!["?"; keys.len()].join(", ");
        fragment.push(
            format!("{} IN ({})", column, placeholders),
            keys.iter().cloned().map(SqlValue::String),
        );
    }
    fragment
}

/// A query builder for database entities.
pub struct EntityQuery<E: DatabaseSchema> {
    _phantom: PhantomData<fn() -> E>,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<E: DatabaseSchema> Default for EntityQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DatabaseSchema> EntityQuery<E> {
    /// Create a new query builder for the entity type.
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add a filter to the query.
    pub fn filter<F: DatabaseFilter + ?Sized>(self, filter: &F) -> Self {
        self.fragment(filter.to_fragment())
    }

    pub fn fragment(mut self, fragment: SqlFragment) -> Self {
        self.where_clauses.extend(fragment.clauses);
        self.values.extend(fragment.values);
        self
    }

    /// Add a raw WHERE clause condition with one placeholder.
    pub fn where_clause(mut self, condition: &str, value: SqlValue) -> Self {
        self.where_clauses.push(condition.to_string());
        self.values.push(value);
        self
    }

    /// Restrict to the row with the given primary key.
    pub fn where_id(self, id: &str) -> Self {
        let condition = format!("{} = ?", E::qualified(E::PRIMARY_KEY));
        self.where_clause(&condition, SqlValue::String(id.to_string()))
    }

    /// Append an ORDER BY term.
    pub fn order_by(mut self, term: String) -> Self {
        self.order_by.push(term);
        self
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset directly.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// ` WHERE ...` (or nothing) and the values it binds
    pub(crate) fn where_parts(&self) -> (String, Vec<SqlValue>) {
        if self.where_clauses.is_empty() {
            (String::new(), self.values.clone())
        } else {
            (
                format!(" WHERE {}", self.where_clauses.join(" AND ")),
                self.values.clone(),
            )
        }
    }

    fn tail_sql(&self) -> String {
        let mut sql = String::new();

        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        let offset = self.offset.filter(|o| *o > 0);
        match (self.limit, offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    /// Build the SELECT statement.
    pub fn build_select(&self) -> (String, Vec<SqlValue>) {
        let (where_sql, values) = self.where_parts();
        let sql = format!(
            "SELECT {} FROM {}{}{}",
            E::select_list(),
            E::TABLE_NAME,
            where_sql,
            self.tail_sql()
        );
        (sql, values)
    }

    /// Build a SELECT of the primary key only.
    pub fn build_select_id(&self) -> (String, Vec<SqlValue>) {
        let (where_sql, values) = self.where_parts();
        let sql = format!(
            "SELECT {} AS id FROM {}{}{}",
            E::qualified(E::PRIMARY_KEY),
            E::TABLE_NAME,
            where_sql,
            self.tail_sql()
        );
        (sql, values)
    }

    /// Build a COUNT query honouring limit and offset.
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let (where_sql, values) = self.where_parts();
        let sql = if self.limit.is_some() || self.offset.is_some_and(|o| o > 0) {
            format!(
                "SELECT COUNT(*) FROM (SELECT 1 FROM {}{}{})",
                E::TABLE_NAME,
                where_sql,
                self.tail_sql()
            )
        } else {
            format!("SELECT COUNT(*) FROM {}{}", E::TABLE_NAME, where_sql)
        };
        (sql, values)
    }

    /// Build an aggregate over the filtered/paged rows.
    ///
    /// The inner select is aliased as the table name so the select list
    /// can keep using qualified columns.
    pub fn build_aggregate(&self, select_list: &str) -> (String, Vec<SqlValue>) {
        let (where_sql, values) = self.where_parts();
        let sql = format!(
            "SELECT {} FROM (SELECT {table}.* FROM {table}{}{}) AS {table}",
            select_list,
            where_sql,
            self.tail_sql(),
            table = E::TABLE_NAME
        );
        (sql, values)
    }

    /// Build an UPDATE of every matching row.
    pub fn build_update(&self, assignments: &Assignments) -> (String, Vec<SqlValue>) {
        let (set_sql, mut values) = assignments.to_sql();
        let (where_sql, where_values) = self.where_parts();
        values.extend(where_values);
        (
            format!("UPDATE {} SET {}{}", E::TABLE_NAME, set_sql, where_sql),
            values,
        )
    }

    /// Build a DELETE of every matching row.
    pub fn build_delete(&self) -> (String, Vec<SqlValue>) {
        let (where_sql, values) = self.where_parts();
        (format!("DELETE FROM {}{}", E::TABLE_NAME, where_sql), values)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Company;

    #[test]
    fn test_select_is_qualified() {
        let (sql, values) = EntityQuery::<Company>::new().build_select();
        assert!(sql.starts_with("SELECT companies.id AS id, companies.name AS name"));
        assert!(sql.ends_with(" FROM companies"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_offset_without_limit() {
        let (sql, _) = EntityQuery::<Company>::new()
            .order_by("companies.name ASC".into())
            .offset(5)
            .build_select();
        assert!(sql.ends_with(" ORDER BY companies.name ASC LIMIT -1 OFFSET 5"));
    }

    #[test]
    fn test_values_follow_clause_order() {
        let (sql, values) = EntityQuery::<Company>::new()
            .where_clause("companies.name = ?", SqlValue::String("Acme".into()))
            .where_id("c1")
            .build_delete();
        assert_eq!(
            sql,
            "DELETE FROM companies WHERE companies.name = ? AND companies.id = ?"
        );
        assert_eq!(
            values,
            vec![SqlValue::String("Acme".into()), SqlValue::String("c1".into())]
        );
    }

    #[test]
    fn test_count_with_paging_uses_subquery() {
        let (sql, _) = EntityQuery::<Company>::new().limit(2).build_count();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM (SELECT 1 FROM companies LIMIT 2)"
        );

        let (sql, _) = EntityQuery::<Company>::new().build_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM companies");
    }

    #[test]
    fn test_in_fragment() {
        let fragment = in_fragment("leaves.membership_id", &["a".into(), "b".into()]);
        assert_eq!(fragment.clauses, vec!["leaves.membership_id IN (?, ?)"]);
        assert_eq!(fragment.values.len(), 2);

        let empty = in_fragment("leaves.membership_id", &[]);
        assert_eq!(empty.clauses, vec!["0 = 1"]);
    }
}
