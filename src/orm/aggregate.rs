//! Aggregate and group-by inputs and results

use std::collections::BTreeMap;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::args::{OrderBy, SortOrder};
use super::traits::{FieldKind, Model, ScalarField, SqlValue};
use crate::error::{ClientError, Result};

/// Decode column `index` of `row` according to the field kind
pub(crate) fn decode_value(
    row: &SqliteRow,
    index: usize,
    kind: FieldKind,
) -> Result<SqlValue, sqlx::Error> {
    Ok(match kind {
        FieldKind::Text | FieldKind::DateTime | FieldKind::Enum => row
            .try_get::<Option<String>, _>(index)?
            .map_or(SqlValue::Null, SqlValue::String),
        FieldKind::Real => row
            .try_get::<Option<f64>, _>(index)?
            .map_or(SqlValue::Null, SqlValue::Float),
        FieldKind::Boolean => row
            .try_get::<Option<i64>, _>(index)?
            .map_or(SqlValue::Null, |v| SqlValue::Bool(v != 0)),
    })
}

/// Which aggregates to compute
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSelection<F> {
    /// `COUNT(*)`
    pub count_all: bool,
    /// Non-null counts per field
    pub count: Vec<F>,
    pub avg: Vec<F>,
    pub sum: Vec<F>,
    pub min: Vec<F>,
    pub max: Vec<F>,
}

impl<F> Default for AggregateSelection<F> {
    fn default() -> Self {
        Self {
            count_all: false,
            count: Vec::new(),
            avg: Vec::new(),
            sum: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<F: ScalarField> AggregateSelection<F> {
    pub fn is_empty(&self) -> bool {
        !self.count_all
            && self.count.is_empty()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    pub(crate) fn validate(&self, model: &'static str) -> Result<()> {
        for (name, fields) in [("avg", &self.avg), ("sum", &self.sum)] {
            if let Some(field) = fields.iter().find(|f| !f.kind().is_numeric()) {
                return Err(ClientError::validation(
                    model,
                    format!("_{} is only available on numeric fields, not {:?}", name, field),
                ));
            }
        }
        Ok(())
    }

    /// Select expressions in decode order
    pub(crate) fn expressions(&self, table: &str) -> Vec<String> {
        let mut exprs = Vec::new();
        if self.count_all {
            exprs.push("COUNT(*)".to_string());
        }
        let groups = [
            ("COUNT", &self.count),
            ("AVG", &self.avg),
            ("SUM", &self.sum),
            ("MIN", &self.min),
            ("MAX", &self.max),
        ];
        for (function, fields) in groups {
            for field in fields {
                exprs.push(format!("{}({}.{})", function, table, field.column()));
            }
        }
        exprs
    }

    /// Decode the aggregate columns starting at `start`
    pub(crate) fn decode(
        &self,
        row: &SqliteRow,
        start: usize,
    ) -> Result<AggregateResult<F>, sqlx::Error> {
        let mut index = start;
        let mut result = AggregateResult::default();

        if self.count_all {
            result.count_all = Some(row.try_get::<i64, _>(index)?);
            index += 1;
        }
        for field in &self.count {
            result.count.insert(*field, row.try_get::<i64, _>(index)?);
            index += 1;
        }
        for field in &self.avg {
            result.avg.insert(*field, row.try_get::<Option<f64>, _>(index)?);
            index += 1;
        }
        for field in &self.sum {
            result.sum.insert(*field, row.try_get::<Option<f64>, _>(index)?);
            index += 1;
        }
        for field in &self.min {
            result.min.insert(*field, decode_value(row, index, field.kind())?);
            index += 1;
        }
        for field in &self.max {
            result.max.insert(*field, decode_value(row, index, field.kind())?);
            index += 1;
        }

        Ok(result)
    }
}

/// Computed aggregates, keyed by field
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult<F: Ord> {
    pub count_all: Option<i64>,
    pub count: BTreeMap<F, i64>,
    /// `None` when every value was NULL (or there were no rows)
    pub avg: BTreeMap<F, Option<f64>>,
    pub sum: BTreeMap<F, Option<f64>>,
    pub min: BTreeMap<F, SqlValue>,
    pub max: BTreeMap<F, SqlValue>,
}

impl<F: Ord> Default for AggregateResult<F> {
    fn default() -> Self {
        Self {
            count_all: None,
            count: BTreeMap::new(),
            avg: BTreeMap::new(),
            sum: BTreeMap::new(),
            min: BTreeMap::new(),
            max: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AggregateArgs<M: Model> {
    pub filter: M::Where,
    pub order_by: Vec<OrderBy<M::Field>>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub select: AggregateSelection<M::Field>,
}

impl<M: Model> Default for AggregateArgs<M> {
    fn default() -> Self {
        Self {
            filter: M::Where::default(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            select: AggregateSelection::default(),
        }
    }
}

impl<M: Model> AggregateArgs<M> {
    pub fn new(filter: M::Where) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order: OrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn count_all(mut self) -> Self {
        self.select.count_all = true;
        self
    }

    pub fn count(mut self, field: M::Field) -> Self {
        self.select.count.push(field);
        self
    }

    pub fn avg(mut self, field: M::Field) -> Self {
        self.select.avg.push(field);
        self
    }

    pub fn sum(mut self, field: M::Field) -> Self {
        self.select.sum.push(field);
        self
    }

    pub fn min(mut self, field: M::Field) -> Self {
        self.select.min.push(field);
        self
    }

    pub fn max(mut self, field: M::Field) -> Self {
        self.select.max.push(field);
        self
    }
}

/// A grouped column or an aggregate, as used by `having` and `order_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupTarget<F> {
    Field(F),
    CountAll,
    Count(F),
    Avg(F),
    Sum(F),
    Min(F),
    Max(F),
}

impl<F: ScalarField> GroupTarget<F> {
    pub(crate) fn to_sql(self, table: &str) -> String {
        let call = |function: &str, field: F| format!("{}({}.{})", function, table, field.column());
        match self {
            GroupTarget::Field(field) => format!("{}.{}", table, field.column()),
            GroupTarget::CountAll => "COUNT(*)".to_string(),
            GroupTarget::Count(field) => call("COUNT", field),
            GroupTarget::Avg(field) => call("AVG", field),
            GroupTarget::Sum(field) => call("SUM", field),
            GroupTarget::Min(field) => call("MIN", field),
            GroupTarget::Max(field) => call("MAX", field),
        }
    }

    fn validate(self, by: &[F], model: &'static str, clause: &str) -> Result<()> {
        match self {
            GroupTarget::Field(field) if !by.contains(&field) => Err(ClientError::validation(
                model,
                format!("{} references {:?}, which is not in `by`", clause, field),
            )),
            GroupTarget::Avg(field) | GroupTarget::Sum(field) if !field.kind().is_numeric() => {
                Err(ClientError::validation(
                    model,
                    format!("{} aggregates non-numeric field {:?}", clause, field),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Comparison operator of a `having` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    Not,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn to_sql(self) -> &'static str {
        match self {
            Comparison::Equals => "=",
            Comparison::Not => "<>",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }
}

/// `target op value` applied after grouping
#[derive(Debug, Clone, PartialEq)]
pub struct Having<F> {
    pub target: GroupTarget<F>,
    pub op: Comparison,
    pub value: SqlValue,
}

impl<F> Having<F> {
    pub fn new(target: GroupTarget<F>, op: Comparison, value: SqlValue) -> Self {
        Self { target, op, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOrderBy<F> {
    pub target: GroupTarget<F>,
    pub direction: SortOrder,
}

impl<F> GroupOrderBy<F> {
    pub fn asc(target: GroupTarget<F>) -> Self {
        Self {
            target,
            direction: SortOrder::Asc,
        }
    }

    pub fn desc(target: GroupTarget<F>) -> Self {
        Self {
            target,
            direction: SortOrder::Desc,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupByArgs<M: Model> {
    pub by: Vec<M::Field>,
    pub filter: M::Where,
    pub having: Vec<Having<M::Field>>,
    pub order_by: Vec<GroupOrderBy<M::Field>>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub select: AggregateSelection<M::Field>,
}

impl<M: Model> GroupByArgs<M> {
    pub fn new(by: impl IntoIterator<Item = M::Field>) -> Self {
        Self {
            by: by.into_iter().collect(),
            filter: M::Where::default(),
            having: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            select: AggregateSelection::default(),
        }
    }

    pub fn filter(mut self, filter: M::Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn having(mut self, having: Having<M::Field>) -> Self {
        self.having.push(having);
        self
    }

    pub fn order_by(mut self, order: GroupOrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn count_all(mut self) -> Self {
        self.select.count_all = true;
        self
    }

    pub fn count(mut self, field: M::Field) -> Self {
        self.select.count.push(field);
        self
    }

    pub fn avg(mut self, field: M::Field) -> Self {
        self.select.avg.push(field);
        self
    }

    pub fn sum(mut self, field: M::Field) -> Self {
        self.select.sum.push(field);
        self
    }

    pub fn min(mut self, field: M::Field) -> Self {
        self.select.min.push(field);
        self
    }

    pub fn max(mut self, field: M::Field) -> Self {
        self.select.max.push(field);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.by.is_empty() {
            return Err(ClientError::validation(M::NAME, "group_by needs at least one `by` field"));
        }
        self.select.validate(M::NAME)?;
        for having in &self.having {
            having.target.validate(&self.by, M::NAME, "having")?;
        }
        for order in &self.order_by {
            order.target.validate(&self.by, M::NAME, "order_by")?;
        }
        Ok(())
    }
}

/// One group: its key values and aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByRow<F: Ord> {
    pub keys: BTreeMap<F, SqlValue>,
    pub aggregates: AggregateResult<F>,
}
