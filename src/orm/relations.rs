//! Batched relation loading for `include`
//!
//! Each relation is fetched with one `IN (...)` query over the parent
//! keys, then distributed back onto the parents. Nested includes recurse
//! through [`Model::load_relations`].

use std::collections::{HashMap, HashSet};

use super::args::FindManyArgs;
use super::builder::{EntityQuery, in_fragment};
use super::delegate::{decode_rows, distinct_by, effective_order, page};
use super::executor::Executor;
use super::traits::{DatabaseEntity, Model, ScalarField, SqlValue};
use crate::error::Result;

/// Parent keys bound per batch query, below SQLite's historical limit of
/// 999 host parameters with room left for the relation's own filter
pub(crate) const MAX_BATCH_KEYS: usize = 900;

/// Unique keys in first-seen order
pub fn distinct_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Load the to-many side of a relation, grouped by `foreign_key`.
///
/// `args` filter and order apply to the whole batch; skip/take/distinct
/// apply per parent.
pub async fn load_many<T: Model>(
    executor: &Executor,
    args: &FindManyArgs<T>,
    foreign_key: T::Field,
    keys: &[String],
) -> Result<HashMap<String, Vec<T>>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    if keys.is_empty() {
        return Ok(grouped);
    }

    let order = effective_order::<T>(&args.order_by);
    let mut records = Vec::new();
    for chunk in keys.chunks(MAX_BATCH_KEYS) {
        let mut query = EntityQuery::<T>::new()
            .filter(&args.filter)
            .fragment(in_fragment(&T::qualified(foreign_key.column()), chunk));
        for term in &order {
            query = query.order_by(term.to_sql(T::TABLE_NAME, false));
        }
        let (sql, values) = query.build_select();
        let rows = executor.fetch_all(T::NAME, &sql, &values).await?;
        records.extend(decode_rows::<T>(&rows)?);
    }

    let paged = args.skip.is_some() || args.take.is_some() || !args.distinct.is_empty();
    if paged {
        let mut by_parent: Vec<(String, Vec<T>)> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        for record in records {
            let SqlValue::String(key) = record.value(foreign_key) else {
                continue;
            };
            let slot = *position.entry(key.clone()).or_insert_with(|| {
                by_parent.push((key, Vec::new()));
                by_parent.len() - 1
            });
            by_parent[slot].1.push(record);
        }
        records = by_parent
            .into_iter()
            .flat_map(|(_, group)| {
                let group = distinct_by(group, &args.distinct);
                page(group, args.skip.unwrap_or(0), args.take)
            })
            .collect();
    }

    if let Some(include) = &args.include
        && !records.is_empty()
    {
        T::load_relations(&mut records, executor, include).await?;
    }

    for record in records {
        if let SqlValue::String(key) = record.value(foreign_key) {
            grouped.entry(key).or_default().push(record);
        }
    }
    Ok(grouped)
}

/// Load the to-one side of a relation, keyed by primary key
pub async fn load_one<T: Model>(
    executor: &Executor,
    include: &T::Include,
    keys: &[String],
) -> Result<HashMap<String, T>> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let mut records = Vec::new();
    for chunk in keys.chunks(MAX_BATCH_KEYS) {
        let query = EntityQuery::<T>::new()
            .fragment(in_fragment(&T::qualified(T::PRIMARY_KEY), chunk));
        let (sql, values) = query.build_select();
        let rows = executor.fetch_all(T::NAME, &sql, &values).await?;
        records.extend(decode_rows::<T>(&rows)?);
    }

    if !records.is_empty() {
        T::load_relations(&mut records, executor, include).await?;
    }

    Ok(records
        .into_iter()
        .map(|r| (r.id().to_string(), r))
        .collect())
}
