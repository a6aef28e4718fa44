//! LeaveBalance model: remaining days per membership and leave type

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{LeaveType, Membership, MembershipInclude, MembershipWhereInput};
use crate::db::sqlite_helpers::{get_datetime, get_enum};
use crate::error::Result;
use crate::orm::relations::{distinct_keys, load_one};
use crate::orm::{
    Assignments, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema, DateTimeFilter,
    Delegate, EnumFilter, Executor, FieldKind, FloatFilter, ForeignKey, FromSqlRow, InsertValues,
    Model, NumberUpdate, OnDelete, OrderBy, RelationFilter, RelationLink, SqlFragment, SqlValue,
    StringFilter, ToSqlValue, UpdateValues, WhereBuilder, unique_fragment,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub id: String,
    pub membership_id: String,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    /// Days left; may go negative through manual adjustments
    pub remaining: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<Box<Membership>>,
}

pub type LeaveBalanceDelegate = Delegate<LeaveBalance>;
pub type LeaveBalanceOrderByInput = OrderBy<LeaveBalanceField>;

model_fields! {
    /// Scalar columns of [`LeaveBalance`]
    LeaveBalanceField => LEAVE_BALANCE_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        MembershipId => ColumnDef::new("membership_id", FieldKind::Text),
        LeaveType => ColumnDef::new("type", FieldKind::Enum),
        Remaining => ColumnDef::new("remaining", FieldKind::Real).default_value("0"),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const MEMBERSHIP: RelationLink = RelationLink::new("memberships", "id", "membership_id");

const FOREIGN_KEYS: &[ForeignKey] = &[ForeignKey::new(
    "membership_id",
    "memberships",
    OnDelete::Cascade,
)];

impl DatabaseEntity for LeaveBalance {
    const TABLE_NAME: &'static str = "leave_balances";
}

impl DatabaseSchema for LeaveBalance {
    fn columns() -> &'static [ColumnDef] {
        LEAVE_BALANCE_COLUMNS
    }

    fn unique_constraints() -> &'static [&'static [&'static str]] {
        &[&["membership_id", "type"]]
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        FOREIGN_KEYS
    }
}

impl FromSqlRow for LeaveBalance {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            membership_id: row.try_get("membership_id")?,
            leave_type: get_enum(row, "type")?,
            remaining: row.try_get("remaining")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            membership: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaveBalanceWhereInput {
    pub and: Vec<LeaveBalanceWhereInput>,
    pub or: Option<Vec<LeaveBalanceWhereInput>>,
    pub not: Vec<LeaveBalanceWhereInput>,
    pub id: Option<StringFilter>,
    pub membership_id: Option<StringFilter>,
    pub leave_type: Option<EnumFilter<LeaveType>>,
    pub remaining: Option<FloatFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub membership: Option<RelationFilter<MembershipWhereInput>>,
}

impl DatabaseFilter for LeaveBalanceWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(LeaveBalance::TABLE_NAME);
        w.field("id", &self.id)
            .field("membership_id", &self.membership_id)
            .field("type", &self.leave_type)
            .field("remaining", &self.remaining)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .relation(MEMBERSHIP, &self.membership)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaveBalanceWhereUniqueInput {
    Id(String),
    /// The `(membership_id, type)` compound key
    MembershipIdLeaveType {
        membership_id: String,
        leave_type: LeaveType,
    },
}

impl LeaveBalanceWhereUniqueInput {
    pub fn membership_type(membership_id: impl Into<String>, leave_type: LeaveType) -> Self {
        Self::MembershipIdLeaveType {
            membership_id: membership_id.into(),
            leave_type,
        }
    }
}

impl DatabaseFilter for LeaveBalanceWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        match self {
            Self::Id(id) => {
                unique_fragment(LeaveBalance::TABLE_NAME, &[("id", id.to_sql_value())])
            }
            Self::MembershipIdLeaveType {
                membership_id,
                leave_type,
            } => unique_fragment(
                LeaveBalance::TABLE_NAME,
                &[
                    ("membership_id", membership_id.to_sql_value()),
                    ("type", leave_type.to_sql_value()),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveBalanceCreateInput {
    pub id: Option<String>,
    pub membership_id: String,
    pub leave_type: LeaveType,
    /// Column default (0) when unset
    pub remaining: Option<f64>,
}

impl LeaveBalanceCreateInput {
    pub fn new(membership_id: impl Into<String>, leave_type: LeaveType) -> Self {
        Self {
            id: None,
            membership_id: membership_id.into(),
            leave_type,
            remaining: None,
        }
    }

    pub fn remaining(mut self, days: f64) -> Self {
        self.remaining = Some(days);
        self
    }
}

impl InsertValues for LeaveBalanceCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        let mut values = vec![
            ("membership_id", self.membership_id.to_sql_value()),
            ("type", self.leave_type.to_sql_value()),
        ];
        if let Some(remaining) = self.remaining {
            values.push(("remaining", remaining.to_sql_value()));
        }
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaveBalanceUpdateInput {
    pub membership_id: Option<String>,
    pub leave_type: Option<LeaveType>,
    pub remaining: Option<NumberUpdate>,
}

impl LeaveBalanceUpdateInput {
    pub fn increment(days: f64) -> Self {
        Self {
            remaining: Some(NumberUpdate::Increment(days)),
            ..Default::default()
        }
    }

    pub fn decrement(days: f64) -> Self {
        Self {
            remaining: Some(NumberUpdate::Decrement(days)),
            ..Default::default()
        }
    }
}

impl UpdateValues for LeaveBalanceUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("membership_id", &self.membership_id)
            .set("type", &self.leave_type)
            .number("remaining", &self.remaining);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaveBalanceInclude {
    pub membership: Option<Box<MembershipInclude>>,
}

impl LeaveBalanceInclude {
    pub fn membership(mut self, include: MembershipInclude) -> Self {
        self.membership = Some(Box::new(include));
        self
    }
}

#[async_trait]
impl Model for LeaveBalance {
    const NAME: &'static str = "LeaveBalance";
    const ID_FIELD: LeaveBalanceField = LeaveBalanceField::Id;
    const DEFAULT_ORDER: OrderBy<LeaveBalanceField> = OrderBy::asc(LeaveBalanceField::CreatedAt);

    type Field = LeaveBalanceField;
    type Where = LeaveBalanceWhereInput;
    type WhereUnique = LeaveBalanceWhereUniqueInput;
    type Create = LeaveBalanceCreateInput;
    type Update = LeaveBalanceUpdateInput;
    type Include = LeaveBalanceInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: LeaveBalanceField) -> SqlValue {
        match field {
            LeaveBalanceField::Id => self.id.to_sql_value(),
            LeaveBalanceField::MembershipId => self.membership_id.to_sql_value(),
            LeaveBalanceField::LeaveType => self.leave_type.to_sql_value(),
            LeaveBalanceField::Remaining => self.remaining.to_sql_value(),
            LeaveBalanceField::CreatedAt => self.created_at.to_sql_value(),
            LeaveBalanceField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &LeaveBalanceInclude,
    ) -> Result<()> {
        if let Some(nested) = include.membership.as_deref() {
            let keys = distinct_keys(records.iter().map(|r| r.membership_id.clone()));
            let found = load_one::<Membership>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.membership = found.get(&record.membership_id).cloned().map(Box::new);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            LeaveBalance::create_table_sql(),
            "CREATE TABLE IF NOT EXISTS leave_balances (\n  id TEXT PRIMARY KEY,\n  membership_id TEXT NOT NULL,\n  type TEXT NOT NULL,\n  remaining REAL NOT NULL DEFAULT 0,\n  created_at TEXT NOT NULL,\n  updated_at TEXT NOT NULL,\n  UNIQUE (membership_id, type),\n  FOREIGN KEY (membership_id) REFERENCES memberships(id) ON DELETE CASCADE\n)"
        );
    }

    #[test]
    fn test_compound_unique_uses_enum_label() {
        let fragment =
            LeaveBalanceWhereUniqueInput::membership_type("m1", LeaveType::Paid).to_fragment();
        assert_eq!(
            fragment.clauses,
            vec!["leave_balances.membership_id = ?", "leave_balances.type = ?"]
        );
        assert_eq!(fragment.values[1], SqlValue::String("PAID".into()));
    }

    #[test]
    fn test_increment_assignment() {
        let (sql, values) = LeaveBalanceUpdateInput::increment(2.5).assignments().to_sql();
        assert_eq!(sql, "remaining = remaining + ?");
        assert_eq!(values, vec![SqlValue::Float(2.5)]);
    }
}
