//! UPDATE inputs: SET assignments and atomic number operations

use super::traits::{SqlValue, ToSqlValue};

/// Atomic operation on a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberUpdate {
    Set(f64),
    Increment(f64),
    Decrement(f64),
    Multiply(f64),
    Divide(f64),
}

impl NumberUpdate {
    fn to_sql(self, column: &str) -> (String, SqlValue) {
        let (expr, value) = match self {
            NumberUpdate::Set(v) => ("?".to_string(), v),
            NumberUpdate::Increment(v) => (format!("{} + ?", column), v),
            NumberUpdate::Decrement(v) => (format!("{} - ?", column), v),
            NumberUpdate::Multiply(v) => (format!("{} * ?", column), v),
            NumberUpdate::Divide(v) => (format!("{} / ?", column), v),
        };
        (expr, SqlValue::Float(value))
    }
}

impl From<f64> for NumberUpdate {
    fn from(value: f64) -> Self {
        NumberUpdate::Set(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    column: String,
    expr: String,
    values: Vec<SqlValue>,
}

/// Ordered SET clause of an UPDATE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    items: Vec<Assignment>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = ?` when the input is set.
    ///
    /// Nullable columns use `Option<Option<T>>`: `Some(None)` writes NULL.
    pub fn set<T: ToSqlValue>(&mut self, column: &str, value: &Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.push_value(column, value.to_sql_value());
        }
        self
    }

    /// Apply a [`NumberUpdate`] when the input is set
    pub fn number(&mut self, column: &str, value: &Option<NumberUpdate>) -> &mut Self {
        if let Some(op) = value {
            let (expr, value) = op.to_sql(column);
            self.items.push(Assignment {
                column: column.to_string(),
                expr,
                values: vec![value],
            });
        }
        self
    }

    pub fn push_value(&mut self, column: &str, value: SqlValue) -> &mut Self {
        self.items.push(Assignment {
            column: column.to_string(),
            expr: "?".to_string(),
            values: vec![value],
        });
        self
    }

    pub fn contains(&self, column: &str) -> bool {
        self.items.iter().any(|a| a.column == column)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `a = ?, b = b + ?` and its values
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut parts = Vec::with_capacity(self.items.len());
        let mut values = Vec::new();
        for item in &self.items {
            parts.push(format!("{} = {}", item.column, item.expr));
            values.extend(item.values.iter().cloned());
        }
        (parts.join(", "), values)
    }
}
