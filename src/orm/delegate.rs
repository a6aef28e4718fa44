//! Per-model CRUD and aggregate operations
//!
//! [`Delegate<M>`] compiles typed arguments into SQL for model `M` and
//! runs them on the client's executor (pool or open transaction).
//!
//! ```rust,ignore
//! let pending = db
//!     .leaves()
//!     .find_many(
//!         FindManyArgs::new()
//!             .filter(LeaveWhereInput {
//!                 status: Some(EnumFilter::eq(LeaveStatus::Pending)),
//!                 ..Default::default()
//!             })
//!             .order_by(OrderBy::asc(LeaveField::StartDate))
//!             .take(20),
//!     )
//!     .await?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::aggregate::{AggregateArgs, AggregateResult, GroupByArgs, GroupByRow, decode_value};
use super::args::{
    BatchPayload, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, FindManyArgs,
    FindUniqueArgs, NullsOrder, OrderBy, SortOrder, UpdateArgs, UpdateManyArgs, UpsertArgs,
};
use super::builder::{EntityQuery, SqlFragment};
use super::executor::Executor;
use super::traits::{
    DatabaseEntity, InsertValues, Model, ScalarField, SqlValue, UpdateValues,
};
use crate::db::sqlite_helpers::{new_id, now_iso8601};
use crate::error::{ClientError, Result};

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn decode_rows<M: Model>(rows: &[SqliteRow]) -> Result<Vec<M>> {
    rows.iter()
        .map(|row| M::from_row(row).map_err(|e| ClientError::from_sqlx(M::NAME, e)))
        .collect()
}

/// Requested order, else the model default, always ending on the primary
/// key so that paging is deterministic.
pub(crate) fn effective_order<M: Model>(requested: &[OrderBy<M::Field>]) -> Vec<OrderBy<M::Field>> {
    let mut order = if requested.is_empty() {
        vec![M::DEFAULT_ORDER]
    } else {
        requested.to_vec()
    };
    if !order.iter().any(|o| o.field == M::ID_FIELD) {
        order.push(OrderBy::asc(M::ID_FIELD));
    }
    order
}

/// Keep the first record of each distinct value combination
pub(crate) fn distinct_by<M: Model>(records: Vec<M>, fields: &[M::Field]) -> Vec<M> {
    if fields.is_empty() {
        return records;
    }
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let key: Vec<SqlValue> = fields.iter().map(|f| record.value(*f)).collect();
            seen.insert(format!("{:?}", key))
        })
        .collect()
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// In-memory skip/take. A negative `take` keeps the last rows.
pub(crate) fn page<M>(records: Vec<M>, skip: i64, take: Option<i64>) -> Vec<M> {
    let skip = to_usize(skip.max(0));
    match take {
        Some(take) if take < 0 => {
            let mut tail: Vec<M> = records
                .into_iter()
                .rev()
                .skip(skip)
                .take(to_usize(-take))
                .collect();
            tail.reverse();
            tail
        }
        Some(take) => records.into_iter().skip(skip).take(to_usize(take)).collect(),
        None => records.into_iter().skip(skip).collect(),
    }
}

/// One column's "strictly after the anchor" predicate.
///
/// SQLite sorts NULL below every value, so NULLs come first when the
/// effective direction is ascending unless `NULLS LAST` is requested.
/// `None` means no row can come after the anchor on this column.
fn after_anchor(
    column: &str,
    nullable: bool,
    anchor: SqlValue,
    ascending: bool,
    nulls_first: bool,
) -> Option<(String, Vec<SqlValue>)> {
    let op = if ascending { ">" } else { "<" };
    match anchor {
        SqlValue::Null if nulls_first => Some((format!("{} IS NOT NULL", column), Vec::new())),
        SqlValue::Null => None,
        value if nulls_first || !nullable => Some((format!("{} {} ?", column, op), vec![value])),
        value => Some((
            format!("({} {} ? OR {} IS NULL)", column, op, column),
            vec![value],
        )),
    }
}

/// Rows strictly after the cursor row in `order`, plus the cursor row itself
fn cursor_condition<M: Model>(
    anchor: &M,
    order: &[OrderBy<M::Field>],
    backwards: bool,
) -> SqlFragment {
    let mut branches = Vec::with_capacity(order.len() + 1);
    let mut values = Vec::new();

    for (i, term) in order.iter().enumerate() {
        let ascending = (term.direction == SortOrder::Asc) != backwards;
        let nulls = if backwards {
            term.nulls.map(NullsOrder::reverse)
        } else {
            term.nulls
        };
        let nulls_first = nulls.map_or(ascending, |n| n == NullsOrder::First);
        let column = M::qualified(term.field.column());
        let Some((after, after_values)) = after_anchor(
            &column,
            term.field.nullable(),
            anchor.value(term.field),
            ascending,
            nulls_first,
        ) else {
            continue;
        };

        let mut parts = Vec::with_capacity(i + 1);
        for prev in &order[..i] {
            parts.push(format!("{} IS ?", M::qualified(prev.field.column())));
            values.push(anchor.value(prev.field));
        }
        parts.push(after);
        values.extend(after_values);
        branches.push(format!("({})", parts.join(" AND ")));
    }

    branches.push(format!("{} = ?", M::qualified(M::PRIMARY_KEY)));
    values.push(SqlValue::String(anchor.id().to_string()));

    let mut fragment = SqlFragment::new();
    fragment.push(format!("({})", branches.join(" OR ")), values);
    fragment
}

/// Filtered rows windowed by skip/take, for subqueries whose output
/// order does not matter. A negative `take` windows from the end.
fn paged_query<M: Model>(
    filter: &M::Where,
    order_by: &[OrderBy<M::Field>],
    skip: i64,
    take: Option<i64>,
) -> EntityQuery<M> {
    let backwards = take.is_some_and(|t| t < 0);
    let mut query = EntityQuery::<M>::new().filter(filter).offset(skip);
    for term in effective_order::<M>(order_by) {
        query = query.order_by(term.to_sql(M::TABLE_NAME, backwards));
    }
    if let Some(take) = take {
        query = query.limit(take.abs());
    }
    query
}

fn check_paging(model: &'static str, skip: Option<i64>) -> Result<i64> {
    match skip {
        Some(skip) if skip < 0 => Err(ClientError::validation(model, "skip must not be negative")),
        Some(skip) => Ok(skip),
        None => Ok(0),
    }
}

// ============================================================================
// Delegate
// ============================================================================

/// Typed operations on one model
pub struct Delegate<M: Model> {
    executor: Executor,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Delegate<M> {
    fn clone(&self) -> Self {
        Self::new(self.executor.clone())
    }
}

impl<M: Model> std::fmt::Debug for Delegate<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegate")
            .field("model", &M::NAME)
            .field("executor", &self.executor)
            .finish()
    }
}

impl<M: Model> Delegate<M> {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            _model: PhantomData,
        }
    }

    async fn include(&self, records: &mut [M], include: Option<&M::Include>) -> Result<()> {
        match include {
            Some(include) if !records.is_empty() => {
                M::load_relations(records, &self.executor, include).await
            }
            _ => Ok(()),
        }
    }

    async fn fetch(&self, query: EntityQuery<M>) -> Result<Vec<M>> {
        let (sql, values) = query.build_select();
        let rows = self.executor.fetch_all(M::NAME, &sql, &values).await?;
        decode_rows::<M>(&rows)
    }

    async fn by_id(&self, id: &str, include: Option<&M::Include>) -> Result<Option<M>> {
        let mut records = self.fetch(EntityQuery::new().where_id(id).limit(1)).await?;
        self.include(&mut records, include).await?;
        Ok(records.pop())
    }

    /// Primary key of the row matched by a unique selector
    async fn unique_id(&self, filter: &M::WhereUnique) -> Result<Option<String>> {
        let (sql, values) = EntityQuery::<M>::new().filter(filter).limit(1).build_select_id();
        let row = self.executor.fetch_optional(M::NAME, &sql, &values).await?;
        row.map(|r| r.try_get::<String, _>("id"))
            .transpose()
            .map_err(|e| ClientError::from_sqlx(M::NAME, e))
    }

    /// INSERT one row, returning its id and the affected row count
    async fn insert(&self, data: &M::Create, skip_duplicates: bool) -> Result<(String, u64)> {
        let id = data.id().map_or_else(new_id, str::to_string);
        let now = now_iso8601();

        let mut columns = vec![M::PRIMARY_KEY];
        let mut values = vec![SqlValue::String(id.clone())];
        for (column, value) in data.values() {
            if column != M::PRIMARY_KEY {
                columns.push(column);
                values.push(value);
            }
        }
        for timestamp in [M::CREATED_AT, M::UPDATED_AT].into_iter().flatten() {
            if !columns.contains(&timestamp) {
                columns.push(timestamp);
                values.push(SqlValue::String(now.clone()));
            }
        }

        let verb = if skip_duplicates { "INSERT OR IGNORE" } else { "INSERT" };
        let sql = format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            M::TABLE_NAME,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let affected = self.executor.execute(M::NAME, &sql, &values).await?;
        Ok((id, affected))
    }

    /// UPDATE every row matched by `query`; refreshes `updated_at`
    async fn update_matching(&self, query: EntityQuery<M>, data: &M::Update) -> Result<u64> {
        let mut assignments = data.assignments();
        // Nothing to write: the row is only read back
        if assignments.is_empty() {
            return Ok(0);
        }
        if let Some(column) = M::UPDATED_AT
            && !assignments.contains(column)
        {
            assignments.push_value(column, SqlValue::String(now_iso8601()));
        }
        let (sql, values) = query.build_update(&assignments);
        self.executor.execute(M::NAME, &sql, &values).await
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn find_unique(&self, args: FindUniqueArgs<M>) -> Result<Option<M>> {
        let mut records = self
            .fetch(EntityQuery::new().filter(&args.filter).limit(1))
            .await?;
        self.include(&mut records, args.include.as_ref()).await?;
        Ok(records.pop())
    }

    pub async fn find_unique_or_throw(&self, args: FindUniqueArgs<M>) -> Result<M> {
        self.find_unique(args)
            .await?
            .ok_or_else(|| ClientError::not_found(M::NAME, "find_unique_or_throw"))
    }

    pub async fn find_first(&self, mut args: FindManyArgs<M>) -> Result<Option<M>> {
        args.take = Some(if args.take.is_some_and(|t| t < 0) { -1 } else { 1 });
        Ok(self.find_many(args).await?.into_iter().next())
    }

    pub async fn find_first_or_throw(&self, args: FindManyArgs<M>) -> Result<M> {
        self.find_first(args)
            .await?
            .ok_or_else(|| ClientError::not_found(M::NAME, "find_first_or_throw"))
    }

    pub async fn find_many(&self, args: FindManyArgs<M>) -> Result<Vec<M>> {
        let skip = check_paging(M::NAME, args.skip)?;
        let order = effective_order::<M>(&args.order_by);
        let backwards = args.take.is_some_and(|t| t < 0);
        let take = args.take.map(i64::abs);

        let mut query = EntityQuery::<M>::new().filter(&args.filter);
        if let Some(cursor) = &args.cursor {
            let anchor = self
                .fetch(EntityQuery::new().filter(cursor).limit(1))
                .await?
                .pop();
            let Some(anchor) = anchor else {
                return Ok(Vec::new());
            };
            query = query.fragment(cursor_condition(&anchor, &order, backwards));
        }
        for term in &order {
            query = query.order_by(term.to_sql(M::TABLE_NAME, backwards));
        }
        if args.distinct.is_empty() {
            if let Some(take) = take {
                query = query.limit(take);
            }
            query = query.offset(skip);
        }

        let mut records = self.fetch(query).await?;
        if !args.distinct.is_empty() {
            records = page(distinct_by(records, &args.distinct), skip, take);
        }
        if backwards {
            records.reverse();
        }

        self.include(&mut records, args.include.as_ref()).await?;
        Ok(records)
    }

    pub async fn count(&self, args: CountArgs<M>) -> Result<i64> {
        let skip = check_paging(M::NAME, args.skip)?;
        let query = paged_query::<M>(&args.filter, &[], skip, args.take);
        let (sql, values) = query.build_count();
        let row = self.executor.fetch_one(M::NAME, &sql, &values).await?;
        row.try_get::<i64, _>(0)
            .map_err(|e| ClientError::from_sqlx(M::NAME, e))
    }

    pub async fn aggregate(&self, args: AggregateArgs<M>) -> Result<AggregateResult<M::Field>> {
        if args.select.is_empty() {
            return Err(ClientError::validation(M::NAME, "aggregate needs at least one selection"));
        }
        args.select.validate(M::NAME)?;
        let skip = check_paging(M::NAME, args.skip)?;

        let query = paged_query::<M>(&args.filter, &args.order_by, skip, args.take);
        let select_list = args.select.expressions(M::TABLE_NAME).join(", ");
        let (sql, values) = query.build_aggregate(&select_list);
        let row = self.executor.fetch_one(M::NAME, &sql, &values).await?;
        args.select
            .decode(&row, 0)
            .map_err(|e| ClientError::from_sqlx(M::NAME, e))
    }

    pub async fn group_by(&self, args: GroupByArgs<M>) -> Result<Vec<GroupByRow<M::Field>>> {
        args.validate()?;
        let skip = check_paging(M::NAME, args.skip)?;
        let table = M::TABLE_NAME;

        let keys: Vec<String> = args.by.iter().map(|f| M::qualified(f.column())).collect();
        let mut select = keys.clone();
        select.extend(args.select.expressions(table));

        let (where_sql, mut values) = EntityQuery::<M>::new().filter(&args.filter).where_parts();
        let mut sql = format!(
            "SELECT {} FROM {}{} GROUP BY {}",
            select.join(", "),
            table,
            where_sql,
            keys.join(", ")
        );

        if !args.having.is_empty() {
            let conditions: Vec<String> = args
                .having
                .iter()
                .map(|h| format!("{} {} ?", h.target.to_sql(table), h.op.to_sql()))
                .collect();
            values.extend(args.having.iter().map(|h| h.value.clone()));
            sql.push_str(&format!(" HAVING {}", conditions.join(" AND ")));
        }

        let order: Vec<String> = if args.order_by.is_empty() {
            keys.iter().map(|k| format!("{} ASC", k)).collect()
        } else {
            args.order_by
                .iter()
                .map(|o| format!("{} {}", o.target.to_sql(table), o.direction.to_sql()))
                .collect()
        };
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));

        match (args.take, skip) {
            (Some(take), _) => sql.push_str(&format!(" LIMIT {}", take.max(0))),
            (None, s) if s > 0 => sql.push_str(" LIMIT -1"),
            _ => {}
        }
        if skip > 0 {
            sql.push_str(&format!(" OFFSET {}", skip));
        }

        let rows = self.executor.fetch_all(M::NAME, &sql, &values).await?;
        rows.iter()
            .map(|row| {
                let mut group_keys = BTreeMap::new();
                for (index, field) in args.by.iter().enumerate() {
                    group_keys.insert(*field, decode_value(row, index, field.kind())?);
                }
                let aggregates = args.select.decode(row, args.by.len())?;
                Ok(GroupByRow {
                    keys: group_keys,
                    aggregates,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| ClientError::from_sqlx(M::NAME, e))
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    pub async fn create(&self, args: CreateArgs<M>) -> Result<M> {
        let (id, _) = self.insert(&args.data, false).await?;
        self.by_id(&id, args.include.as_ref())
            .await?
            .ok_or_else(|| ClientError::not_found(M::NAME, "create"))
    }

    /// Insert every row or none
    pub async fn create_many(&self, args: CreateManyArgs<M>) -> Result<BatchPayload> {
        let CreateManyArgs {
            data,
            skip_duplicates,
        } = args;
        self.executor
            .atomically(move |executor| async move {
                let delegate = Self::new(executor);
                let mut count = 0;
                for row in &data {
                    let (_, affected) = delegate.insert(row, skip_duplicates).await?;
                    count += affected;
                }
                Ok(BatchPayload { count })
            })
            .await
    }

    /// Like [`create_many`](Self::create_many), returning the inserted rows
    pub async fn create_many_and_return(&self, args: CreateManyArgs<M>) -> Result<Vec<M>> {
        let CreateManyArgs {
            data,
            skip_duplicates,
        } = args;
        self.executor
            .atomically(move |executor| async move {
                let delegate = Self::new(executor);
                let mut created = Vec::with_capacity(data.len());
                for row in &data {
                    let (id, affected) = delegate.insert(row, skip_duplicates).await?;
                    if affected == 0 {
                        continue;
                    }
                    if let Some(record) = delegate.by_id(&id, None).await? {
                        created.push(record);
                    }
                }
                Ok(created)
            })
            .await
    }

    pub async fn update(&self, args: UpdateArgs<M>) -> Result<M> {
        let UpdateArgs {
            filter,
            data,
            include,
        } = args;
        self.executor
            .atomically(move |executor| async move {
                let delegate = Self::new(executor);
                let id = delegate
                    .unique_id(&filter)
                    .await?
                    .ok_or_else(|| ClientError::not_found(M::NAME, "update"))?;
                delegate
                    .update_matching(EntityQuery::new().where_id(&id), &data)
                    .await?;
                delegate
                    .by_id(&id, include.as_ref())
                    .await?
                    .ok_or_else(|| ClientError::not_found(M::NAME, "update"))
            })
            .await
    }

    pub async fn update_many(&self, args: UpdateManyArgs<M>) -> Result<BatchPayload> {
        if args.data.assignments().is_empty() {
            let count = self.count(CountArgs::new(args.filter)).await?;
            return Ok(BatchPayload {
                count: u64::try_from(count).unwrap_or_default(),
            });
        }
        let query = EntityQuery::<M>::new().filter(&args.filter);
        let count = self.update_matching(query, &args.data).await?;
        Ok(BatchPayload { count })
    }

    /// Update the row matched by the unique selector, or create it
    pub async fn upsert(&self, args: UpsertArgs<M>) -> Result<M> {
        let UpsertArgs {
            filter,
            create,
            update,
            include,
        } = args;
        self.executor
            .atomically(move |executor| async move {
                let delegate = Self::new(executor);
                let id = match delegate.unique_id(&filter).await? {
                    Some(id) => {
                        delegate
                            .update_matching(EntityQuery::new().where_id(&id), &update)
                            .await?;
                        id
                    }
                    None => delegate.insert(&create, false).await?.0,
                };
                delegate
                    .by_id(&id, include.as_ref())
                    .await?
                    .ok_or_else(|| ClientError::not_found(M::NAME, "upsert"))
            })
            .await
    }

    /// Delete one row, returning it as it was (relations included)
    pub async fn delete(&self, args: DeleteArgs<M>) -> Result<M> {
        let DeleteArgs { filter, include } = args;
        self.executor
            .atomically(move |executor| async move {
                let delegate = Self::new(executor);
                let record = delegate
                    .find_unique(FindUniqueArgs { filter, include })
                    .await?
                    .ok_or_else(|| ClientError::not_found(M::NAME, "delete"))?;
                let (sql, values) = EntityQuery::<M>::new().where_id(record.id()).build_delete();
                delegate.executor.execute(M::NAME, &sql, &values).await?;
                Ok(record)
            })
            .await
    }

    pub async fn delete_many(&self, args: DeleteManyArgs<M>) -> Result<BatchPayload> {
        let (sql, values) = EntityQuery::<M>::new().filter(&args.filter).build_delete();
        let count = self.executor.execute(M::NAME, &sql, &values).await?;
        Ok(BatchPayload { count })
    }
}
