//! Filter input types for flexible querying
//!
//! Field filters support:
//! - equals / not
//! - lt, lte, gt, gte (comparisons)
//! - contains, starts_with, ends_with (string matching, optionally case-insensitive)
//! - in_list, not_in (list membership)
//! - is_null
//!
//! Relation filters turn into correlated `EXISTS` subqueries, and
//! [`WhereBuilder`] assembles both kinds plus AND/OR/NOT into a
//! [`SqlFragment`].

use chrono::{DateTime, Utc};

use super::builder::SqlFragment;
use super::traits::{DatabaseFilter, DbEnum, SqlValue, ToSqlValue};

/// Compiles a field filter against one qualified column
pub trait FieldFilter: Send + Sync {
    fn apply(&self, column: &str, out: &mut SqlFragment);
}

/// `column IN (?, ...)`; an empty list matches nothing
fn push_in(out: &mut SqlFragment, column: &str, param: &str, values: Vec<SqlValue>) {
    if values.is_empty() {
        out.push("0 = 1", []);
        return;
    }
    let placeholders = vec![param; values.len()].join(", ");
    out.push(format!("{} IN ({})", column, placeholders), values);
}

/// `column NOT IN (?, ...)`; an empty list excludes nothing
fn push_not_in(out: &mut SqlFragment, column: &str, param: &str, values: Vec<SqlValue>) {
    if values.is_empty() {
        return;
    }
    let placeholders = vec![param; values.len()].join(", ");
    out.push(format!("{} NOT IN ({})", column, placeholders), values);
}

fn push_is_null(out: &mut SqlFragment, column: &str, is_null: Option<bool>) {
    match is_null {
        Some(true) => out.push(format!("{} IS NULL", column), []),
        Some(false) => out.push(format!("{} IS NOT NULL", column), []),
        None => {}
    }
}

// ============================================================================
// String
// ============================================================================

/// Case sensitivity of string comparisons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    #[default]
    Default,
    /// Compare `lower()` of both sides
    Insensitive,
}

/// Filter for string fields
#[derive(Default, Clone, Debug, PartialEq)]
pub struct StringFilter {
    pub equals: Option<String>,
    pub not: Option<String>,
    pub in_list: Option<Vec<String>>,
    pub not_in: Option<Vec<String>>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub mode: QueryMode,
    pub is_null: Option<bool>,
}

impl StringFilter {
    /// Create an equals filter
    pub fn eq(value: impl Into<String>) -> Self {
        Self {
            equals: Some(value.into()),
            ..Default::default()
        }
    }

    /// Create a not-equals filter
    pub fn ne(value: impl Into<String>) -> Self {
        Self {
            not: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            contains: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Self {
            starts_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Self {
            ends_with: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn in_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            in_list: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn not_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            not_in: Some(values.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }

    /// Switch every comparison of this filter to case-insensitive
    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }
}

impl FieldFilter for StringFilter {
    fn apply(&self, column: &str, out: &mut SqlFragment) {
        let insensitive = self.mode == QueryMode::Insensitive;
        let col = if insensitive {
            format!("lower({})", column)
        } else {
            column.to_string()
        };
        let param = if insensitive { "lower(?)" } else { "?" };
        let text = |s: &String| SqlValue::String(s.clone());

        let comparisons = [
            (&self.equals, "="),
            (&self.not, "<>"),
            (&self.lt, "<"),
            (&self.lte, "<="),
            (&self.gt, ">"),
            (&self.gte, ">="),
        ];
        for (value, op) in comparisons {
            if let Some(value) = value {
                out.push(format!("{} {} {}", col, op, param), [text(value)]);
            }
        }

        if let Some(values) = &self.in_list {
            push_in(out, &col, param, values.iter().map(text).collect());
        }
        if let Some(values) = &self.not_in {
            push_not_in(out, &col, param, values.iter().map(text).collect());
        }

        // Substring matches avoid LIKE so `%` and `_` in the pattern stay literal
        if let Some(pattern) = self.contains.as_ref().filter(|p| !p.is_empty()) {
            out.push(format!("instr({}, {}) > 0", col, param), [text(pattern)]);
        }
        if let Some(prefix) = self.starts_with.as_ref().filter(|p| !p.is_empty()) {
            out.push(
                format!("substr({}, 1, length({p})) = {p}", col, p = param),
                [text(prefix), text(prefix)],
            );
        }
        if let Some(suffix) = self.ends_with.as_ref().filter(|p| !p.is_empty()) {
            out.push(
                format!("substr({}, -length({p})) = {p}", col, p = param),
                [text(suffix), text(suffix)],
            );
        }

        push_is_null(out, column, self.is_null);
    }
}

// ============================================================================
// Ordered scalars (float, datetime)
// ============================================================================

/// Filter for ordered scalar fields
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarFilter<T> {
    pub equals: Option<T>,
    pub not: Option<T>,
    pub in_list: Option<Vec<T>>,
    pub not_in: Option<Vec<T>>,
    pub lt: Option<T>,
    pub lte: Option<T>,
    pub gt: Option<T>,
    pub gte: Option<T>,
    pub is_null: Option<bool>,
}

/// Filter for day counts and other REAL columns
pub type FloatFilter = ScalarFilter<f64>;

/// Filter for date/timestamp fields
pub type DateTimeFilter = ScalarFilter<DateTime<Utc>>;

impl<T> Default for ScalarFilter<T> {
    fn default() -> Self {
        Self {
            equals: None,
            not: None,
            in_list: None,
            not_in: None,
            lt: None,
            lte: None,
            gt: None,
            gte: None,
            is_null: None,
        }
    }
}

impl<T> ScalarFilter<T> {
    pub fn eq(value: T) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    pub fn ne(value: T) -> Self {
        Self {
            not: Some(value),
            ..Default::default()
        }
    }

    pub fn lt(value: T) -> Self {
        Self {
            lt: Some(value),
            ..Default::default()
        }
    }

    pub fn lte(value: T) -> Self {
        Self {
            lte: Some(value),
            ..Default::default()
        }
    }

    pub fn gt(value: T) -> Self {
        Self {
            gt: Some(value),
            ..Default::default()
        }
    }

    pub fn gte(value: T) -> Self {
        Self {
            gte: Some(value),
            ..Default::default()
        }
    }

    /// Inclusive range
    pub fn between(start: T, end: T) -> Self {
        Self {
            gte: Some(start),
            lte: Some(end),
            ..Default::default()
        }
    }

    pub fn in_list(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            in_list: Some(values.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn not_in(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            not_in: Some(values.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }
}

impl DateTimeFilter {
    /// Strictly before now
    pub fn in_past() -> Self {
        Self::lt(Utc::now())
    }

    /// Strictly after now
    pub fn in_future() -> Self {
        Self::gt(Utc::now())
    }
}

impl<T: ToSqlValue + Send + Sync> FieldFilter for ScalarFilter<T> {
    fn apply(&self, column: &str, out: &mut SqlFragment) {
        let comparisons = [
            (&self.equals, "="),
            (&self.not, "<>"),
            (&self.lt, "<"),
            (&self.lte, "<="),
            (&self.gt, ">"),
            (&self.gte, ">="),
        ];
        for (value, op) in comparisons {
            if let Some(value) = value {
                out.push(format!("{} {} ?", column, op), [value.to_sql_value()]);
            }
        }

        if let Some(values) = &self.in_list {
            push_in(out, column, "?", values.iter().map(ToSqlValue::to_sql_value).collect());
        }
        if let Some(values) = &self.not_in {
            push_not_in(out, column, "?", values.iter().map(ToSqlValue::to_sql_value).collect());
        }

        push_is_null(out, column, self.is_null);
    }
}

// ============================================================================
// Boolean
// ============================================================================

/// Filter for boolean fields
#[derive(Default, Clone, Debug, PartialEq)]
pub struct BoolFilter {
    pub equals: Option<bool>,
    pub not: Option<bool>,
}

impl BoolFilter {
    pub fn eq(value: bool) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    pub fn is_true() -> Self {
        Self::eq(true)
    }

    pub fn is_false() -> Self {
        Self::eq(false)
    }
}

impl FieldFilter for BoolFilter {
    fn apply(&self, column: &str, out: &mut SqlFragment) {
        if let Some(value) = self.equals {
            out.push(format!("{} = ?", column), [SqlValue::Bool(value)]);
        }
        if let Some(value) = self.not {
            out.push(format!("{} <> ?", column), [SqlValue::Bool(value)]);
        }
    }
}

// ============================================================================
// Enum
// ============================================================================

/// Filter for enum fields
#[derive(Clone, Debug, PartialEq)]
pub struct EnumFilter<E> {
    pub equals: Option<E>,
    pub not: Option<E>,
    pub in_list: Option<Vec<E>>,
    pub not_in: Option<Vec<E>>,
}

impl<E> Default for EnumFilter<E> {
    fn default() -> Self {
        Self {
            equals: None,
            not: None,
            in_list: None,
            not_in: None,
        }
    }
}

impl<E: DbEnum> EnumFilter<E> {
    pub fn eq(value: E) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    pub fn ne(value: E) -> Self {
        Self {
            not: Some(value),
            ..Default::default()
        }
    }

    pub fn in_list(values: impl IntoIterator<Item = E>) -> Self {
        Self {
            in_list: Some(values.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn not_in(values: impl IntoIterator<Item = E>) -> Self {
        Self {
            not_in: Some(values.into_iter().collect()),
            ..Default::default()
        }
    }
}

impl<E: DbEnum> FieldFilter for EnumFilter<E> {
    fn apply(&self, column: &str, out: &mut SqlFragment) {
        let label = |e: &E| SqlValue::String(e.as_str().to_string());

        if let Some(value) = &self.equals {
            out.push(format!("{} = ?", column), [label(value)]);
        }
        if let Some(value) = &self.not {
            out.push(format!("{} <> ?", column), [label(value)]);
        }
        if let Some(values) = &self.in_list {
            push_in(out, column, "?", values.iter().map(label).collect());
        }
        if let Some(values) = &self.not_in {
            push_not_in(out, column, "?", values.iter().map(label).collect());
        }
    }
}

// ============================================================================
// Relations
// ============================================================================

/// How a relation joins: rows of `table` whose `foreign` column equals
/// the outer row's `local` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationLink {
    pub table: &'static str,
    pub foreign: &'static str,
    pub local: &'static str,
}

impl RelationLink {
    pub const fn new(table: &'static str, foreign: &'static str, local: &'static str) -> Self {
        Self {
            table,
            foreign,
            local,
        }
    }
}

/// Filter on a to-many relation
#[derive(Clone, Debug)]
pub struct ListRelationFilter<W> {
    /// At least one related record matches
    pub some: Option<Box<W>>,
    /// Every related record matches (true when there are none)
    pub every: Option<Box<W>>,
    /// No related record matches
    pub none: Option<Box<W>>,
}

impl<W> Default for ListRelationFilter<W> {
    fn default() -> Self {
        Self {
            some: None,
            every: None,
            none: None,
        }
    }
}

impl<W> ListRelationFilter<W> {
    pub fn some(filter: W) -> Self {
        Self {
            some: Some(Box::new(filter)),
            ..Default::default()
        }
    }

    pub fn every(filter: W) -> Self {
        Self {
            every: Some(Box::new(filter)),
            ..Default::default()
        }
    }

    pub fn none(filter: W) -> Self {
        Self {
            none: Some(Box::new(filter)),
            ..Default::default()
        }
    }
}

/// Filter on a to-one relation
#[derive(Clone, Debug)]
pub struct RelationFilter<W> {
    pub is: Option<Box<W>>,
    pub is_not: Option<Box<W>>,
    /// Only meaningful for optional relations
    pub is_null: Option<bool>,
}

impl<W> Default for RelationFilter<W> {
    fn default() -> Self {
        Self {
            is: None,
            is_not: None,
            is_null: None,
        }
    }
}

impl<W> RelationFilter<W> {
    pub fn is(filter: W) -> Self {
        Self {
            is: Some(Box::new(filter)),
            ..Default::default()
        }
    }

    pub fn is_not(filter: W) -> Self {
        Self {
            is_not: Some(Box::new(filter)),
            ..Default::default()
        }
    }

    pub fn is_null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    pub fn is_not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Default::default()
        }
    }
}

// ============================================================================
// Where builder
// ============================================================================

/// Accumulates the conditions of one `*WhereInput`
pub struct WhereBuilder {
    table: &'static str,
    fragment: SqlFragment,
}

impl WhereBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            fragment: SqlFragment::new(),
        }
    }

    pub fn field<F: FieldFilter>(&mut self, column: &str, filter: &Option<F>) -> &mut Self {
        if let Some(filter) = filter {
            let qualified = format!("{}.{}", self.table, column);
            filter.apply(&qualified, &mut self.fragment);
        }
        self
    }

    fn exists<W: DatabaseFilter>(
        &self,
        link: RelationLink,
        inner: Option<&W>,
        negate_inner: bool,
    ) -> (String, Vec<SqlValue>) {
        let mut sql = format!(
            "EXISTS (SELECT 1 FROM {t} WHERE {t}.{f} = {outer}.{l}",
            t = link.table,
            f = link.foreign,
            outer = self.table,
            l = link.local
        );
        let mut values = Vec::new();
        if let Some((condition, bound)) = inner.and_then(|w| w.to_fragment().conjunction()) {
            if negate_inner {
                // A NULL comparison counts as failing the condition
                sql.push_str(&format!(" AND NOT coalesce({}, 0)", condition));
            } else {
                sql.push_str(&format!(" AND {}", condition));
            }
            values = bound;
        }
        sql.push(')');
        (sql, values)
    }

    pub fn list_relation<W: DatabaseFilter>(
        &mut self,
        link: RelationLink,
        filter: &Option<ListRelationFilter<W>>,
    ) -> &mut Self {
        let Some(filter) = filter else { return self };

        if let Some(some) = &filter.some {
            let (sql, values) = self.exists(link, Some(some.as_ref()), false);
            self.fragment.push(sql, values);
        }
        if let Some(every) = &filter.every {
            // No related row may fail the condition
            if !every.is_empty() {
                let (sql, values) = self.exists(link, Some(every.as_ref()), true);
                self.fragment.push(format!("NOT {}", sql), values);
            }
        }
        if let Some(none) = &filter.none {
            let (sql, values) = self.exists(link, Some(none.as_ref()), false);
            self.fragment.push(format!("NOT {}", sql), values);
        }
        self
    }

    pub fn relation<W: DatabaseFilter>(
        &mut self,
        link: RelationLink,
        filter: &Option<RelationFilter<W>>,
    ) -> &mut Self {
        let Some(filter) = filter else { return self };

        if let Some(is) = &filter.is {
            let (sql, values) = self.exists(link, Some(is.as_ref()), false);
            self.fragment.push(sql, values);
        }
        if let Some(is_not) = &filter.is_not {
            let (sql, values) = self.exists(link, Some(is_not.as_ref()), false);
            self.fragment.push(format!("NOT {}", sql), values);
        }
        push_is_null(
            &mut self.fragment,
            &format!("{}.{}", self.table, link.local),
            filter.is_null,
        );
        self
    }

    /// Every filter must match
    pub fn and<W: DatabaseFilter>(&mut self, filters: &[W]) -> &mut Self {
        for filter in filters {
            self.fragment.append(filter.to_fragment());
        }
        self
    }

    /// At least one filter must match; an empty list matches nothing
    pub fn or<W: DatabaseFilter>(&mut self, filters: &Option<Vec<W>>) -> &mut Self {
        let Some(filters) = filters else { return self };

        let mut branches = Vec::new();
        let mut values = Vec::new();
        for filter in filters {
            match filter.to_fragment().conjunction() {
                Some((condition, bound)) => {
                    branches.push(condition);
                    values.extend(bound);
                }
                // An empty branch matches every row
                None => branches.push("1 = 1".to_string()),
            }
        }

        if branches.is_empty() {
            self.fragment.push("0 = 1", []);
        } else {
            self.fragment
                .push(format!("({})", branches.join(" OR ")), values);
        }
        self
    }

    /// None of the filters may match
    pub fn not<W: DatabaseFilter>(&mut self, filters: &[W]) -> &mut Self {
        for filter in filters {
            if let Some((condition, values)) = filter.to_fragment().conjunction() {
                self.fragment.push(format!("NOT {}", condition), values);
            }
        }
        self
    }

    pub fn finish(self) -> SqlFragment {
        self.fragment
    }
}

/// Equality on each `(column, value)` pair of a unique selector
pub fn unique_fragment(table: &str, pairs: &[(&str, SqlValue)]) -> SqlFragment {
    let mut fragment = SqlFragment::new();
    for (column, value) in pairs {
        fragment.push(format!("{}.{} = ?", table, column), [value.clone()]);
    }
    fragment
}
