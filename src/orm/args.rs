//! Argument types of the delegate operations

use serde::Serialize;

use super::traits::{Model, ScalarField};

/// Sort direction for ORDER BY clauses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SortOrder {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    Desc,
}

impl SortOrder {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Placement of NULLs in an ordering
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn reverse(self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }
}

/// One ORDER BY term over a model field
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OrderBy<F> {
    pub field: F,
    pub direction: SortOrder,
    /// SQLite's default puts NULLs first ascending and last descending
    pub nulls: Option<NullsOrder>,
}

impl<F> OrderBy<F> {
    pub const fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Asc,
            nulls: None,
        }
    }

    pub const fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }
}

impl<F: ScalarField> OrderBy<F> {
    /// `table.column ASC [NULLS FIRST]`, optionally with everything flipped
    pub fn to_sql(&self, table: &str, reversed: bool) -> String {
        let (direction, nulls) = if reversed {
            (self.direction.reverse(), self.nulls.map(NullsOrder::reverse))
        } else {
            (self.direction, self.nulls)
        };
        let mut sql = format!("{}.{} {}", table, self.field.column(), direction.to_sql());
        match nulls {
            Some(NullsOrder::First) => sql.push_str(" NULLS FIRST"),
            Some(NullsOrder::Last) => sql.push_str(" NULLS LAST"),
            None => {}
        }
        sql
    }
}

/// Number of rows touched by a batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchPayload {
    pub count: u64,
}

#[derive(Clone, Debug)]
pub struct FindUniqueArgs<M: Model> {
    pub filter: M::WhereUnique,
    pub include: Option<M::Include>,
}

impl<M: Model> FindUniqueArgs<M> {
    pub fn new(filter: M::WhereUnique) -> Self {
        Self {
            filter,
            include: None,
        }
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FindManyArgs<M: Model> {
    pub filter: M::Where,
    pub order_by: Vec<OrderBy<M::Field>>,
    /// Start at this row (inclusive)
    pub cursor: Option<M::WhereUnique>,
    /// Page size; negative pages backwards from the cursor
    pub take: Option<i64>,
    pub skip: Option<i64>,
    /// Keep the first row of each distinct combination of these fields
    pub distinct: Vec<M::Field>,
    pub include: Option<M::Include>,
}

impl<M: Model> Default for FindManyArgs<M> {
    fn default() -> Self {
        Self {
            filter: M::Where::default(),
            order_by: Vec::new(),
            cursor: None,
            take: None,
            skip: None,
            distinct: Vec::new(),
            include: None,
        }
    }
}

impl<M: Model> FindManyArgs<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: M::Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order: OrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn cursor(mut self, cursor: M::WhereUnique) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn distinct(mut self, field: M::Field) -> Self {
        self.distinct.push(field);
        self
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct CreateArgs<M: Model> {
    pub data: M::Create,
    pub include: Option<M::Include>,
}

impl<M: Model> CreateArgs<M> {
    pub fn new(data: M::Create) -> Self {
        Self {
            data,
            include: None,
        }
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct CreateManyArgs<M: Model> {
    pub data: Vec<M::Create>,
    /// Silently drop rows that would violate a unique constraint
    pub skip_duplicates: bool,
}

impl<M: Model> CreateManyArgs<M> {
    pub fn new(data: Vec<M::Create>) -> Self {
        Self {
            data,
            skip_duplicates: false,
        }
    }

    pub fn skip_duplicates(mut self) -> Self {
        self.skip_duplicates = true;
        self
    }
}

#[derive(Clone, Debug)]
pub struct UpdateArgs<M: Model> {
    pub filter: M::WhereUnique,
    pub data: M::Update,
    pub include: Option<M::Include>,
}

impl<M: Model> UpdateArgs<M> {
    pub fn new(filter: M::WhereUnique, data: M::Update) -> Self {
        Self {
            filter,
            data,
            include: None,
        }
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct UpdateManyArgs<M: Model> {
    pub filter: M::Where,
    pub data: M::Update,
}

impl<M: Model> UpdateManyArgs<M> {
    pub fn new(filter: M::Where, data: M::Update) -> Self {
        Self { filter, data }
    }
}

#[derive(Clone, Debug)]
pub struct UpsertArgs<M: Model> {
    pub filter: M::WhereUnique,
    pub create: M::Create,
    pub update: M::Update,
    pub include: Option<M::Include>,
}

impl<M: Model> UpsertArgs<M> {
    pub fn new(filter: M::WhereUnique, create: M::Create, update: M::Update) -> Self {
        Self {
            filter,
            create,
            update,
            include: None,
        }
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct DeleteArgs<M: Model> {
    pub filter: M::WhereUnique,
    pub include: Option<M::Include>,
}

impl<M: Model> DeleteArgs<M> {
    pub fn new(filter: M::WhereUnique) -> Self {
        Self {
            filter,
            include: None,
        }
    }

    pub fn include(mut self, include: M::Include) -> Self {
        self.include = Some(include);
        self
    }
}

#[derive(Clone, Debug)]
pub struct DeleteManyArgs<M: Model> {
    pub filter: M::Where,
}

impl<M: Model> DeleteManyArgs<M> {
    pub fn new(filter: M::Where) -> Self {
        Self { filter }
    }
}

impl<M: Model> Default for DeleteManyArgs<M> {
    fn default() -> Self {
        Self::new(M::Where::default())
    }
}

#[derive(Clone, Debug)]
pub struct CountArgs<M: Model> {
    pub filter: M::Where,
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

impl<M: Model> Default for CountArgs<M> {
    fn default() -> Self {
        Self {
            filter: M::Where::default(),
            skip: None,
            take: None,
        }
    }
}

impl<M: Model> CountArgs<M> {
    pub fn new(filter: M::Where) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }
}
