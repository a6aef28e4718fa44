//! Leave model: one absence request and its review state

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{
    LeaveStatus, LeaveType, Membership, MembershipInclude, MembershipWhereInput, User,
    UserInclude, UserWhereInput,
};
use crate::db::sqlite_helpers::{get_datetime, get_datetime_opt, get_enum};
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
pub struct Leave {
    pub id: String,
    pub membership_id: String,
    /// Reviewer; cleared when the user is deleted
    pub manager_id: Option<String>,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Worked days taken, half days allowed
    pub days: f64,
    pub reason: Option<String>,
    pub manager_comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<Box<Membership>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<Box<User>>,
}

pub type LeaveDelegate = Delegate<Leave>;
pub type LeaveOrderByInput = OrderBy<LeaveField>;

model_fields! {
    /// Scalar columns of [`Leave`]
    LeaveField => LEAVE_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        MembershipId => ColumnDef::new("membership_id", FieldKind::Text),
        ManagerId => ColumnDef::new("manager_id", FieldKind::Text).nullable(),
        LeaveType => ColumnDef::new("type", FieldKind::Enum),
        Status => ColumnDef::new("status", FieldKind::Enum).default_value("'PENDING'"),
        StartDate => ColumnDef::new("start_date", FieldKind::DateTime),
        EndDate => ColumnDef::new("end_date", FieldKind::DateTime),
        Days => ColumnDef::new("days", FieldKind::Real),
        Reason => ColumnDef::new("reason", FieldKind::Text).nullable(),
        ManagerComment => ColumnDef::new("manager_comment", FieldKind::Text).nullable(),
        ReviewedAt => ColumnDef::new("reviewed_at", FieldKind::DateTime).nullable(),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const MEMBERSHIP: RelationLink = RelationLink::new("memberships", "id", "membership_id");
const MANAGER: RelationLink = RelationLink::new("users", "id", "manager_id");

const FOREIGN_KEYS: &[ForeignKey] = &[
    ForeignKey::new("membership_id", "memberships", OnDelete::Cascade),
    ForeignKey::new("manager_id", "users", OnDelete::SetNull),
];

impl DatabaseEntity for Leave {
    const TABLE_NAME: &'static str = "leaves";
}

impl DatabaseSchema for Leave {
    fn columns() -> &'static [ColumnDef] {
        LEAVE_COLUMNS
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        FOREIGN_KEYS
    }
}

impl FromSqlRow for Leave {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            membership_id: row.try_get("membership_id")?,
            manager_id: row.try_get("manager_id")?,
            leave_type: get_enum(row, "type")?,
            status: get_enum(row, "status")?,
            start_date: get_datetime(row, "start_date")?,
            end_date: get_datetime(row, "end_date")?,
            days: row.try_get("days")?,
            reason: row.try_get("reason")?,
            manager_comment: row.try_get("manager_comment")?,
            reviewed_at: get_datetime_opt(row, "reviewed_at")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            membership: None,
            manager: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaveWhereInput {
    pub and: Vec<LeaveWhereInput>,
    pub or: Option<Vec<LeaveWhereInput>>,
    pub not: Vec<LeaveWhereInput>,
    pub id: Option<StringFilter>,
    pub membership_id: Option<StringFilter>,
    pub manager_id: Option<StringFilter>,
    pub leave_type: Option<EnumFilter<LeaveType>>,
    pub status: Option<EnumFilter<LeaveStatus>>,
    pub start_date: Option<DateTimeFilter>,
    pub end_date: Option<DateTimeFilter>,
    pub days: Option<FloatFilter>,
    pub reason: Option<StringFilter>,
    pub manager_comment: Option<StringFilter>,
    pub reviewed_at: Option<DateTimeFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub membership: Option<RelationFilter<MembershipWhereInput>>,
    pub manager: Option<RelationFilter<UserWhereInput>>,
}

impl DatabaseFilter for LeaveWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Leave::TABLE_NAME);
        w.field("id", &self.id)
            .field("membership_id", &self.membership_id)
            .field("manager_id", &self.manager_id)
            .field("type", &self.leave_type)
            .field("status", &self.status)
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .field("days", &self.days)
            .field("reason", &self.reason)
            .field("manager_comment", &self.manager_comment)
            .field("reviewed_at", &self.reviewed_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .relation(MEMBERSHIP, &self.membership)
            .relation(MANAGER, &self.manager)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaveWhereUniqueInput {
    Id(String),
}

impl DatabaseFilter for LeaveWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        let Self::Id(id) = self;
        unique_fragment(Leave::TABLE_NAME, &[("id", id.to_sql_value())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveCreateInput {
    pub id: Option<String>,
    pub membership_id: String,
    pub manager_id: Option<String>,
    pub leave_type: LeaveType,
    /// Column default (PENDING) when unset
    pub status: Option<LeaveStatus>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days: f64,
    pub reason: Option<String>,
    pub manager_comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl LeaveCreateInput {
    pub fn new(
        membership_id: impl Into<String>,
        leave_type: LeaveType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        days: f64,
    ) -> Self {
        Self {
            id: None,
            membership_id: membership_id.into(),
            manager_id: None,
            leave_type,
            status: None,
            start_date,
            end_date,
            days,
            reason: None,
            manager_comment: None,
            reviewed_at: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn status(mut self, status: LeaveStatus) -> Self {
        self.status = Some(status);
        self
    }
}

impl InsertValues for LeaveCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        let mut values = vec![
            ("membership_id", self.membership_id.to_sql_value()),
            ("manager_id", self.manager_id.to_sql_value()),
            ("type", self.leave_type.to_sql_value()),
            ("start_date", self.start_date.to_sql_value()),
            ("end_date", self.end_date.to_sql_value()),
            ("days", self.days.to_sql_value()),
            ("reason", self.reason.to_sql_value()),
            ("manager_comment", self.manager_comment.to_sql_value()),
            ("reviewed_at", self.reviewed_at.to_sql_value()),
        ];
        if let Some(status) = self.status {
            values.push(("status", status.to_sql_value()));
        }
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaveUpdateInput {
    pub membership_id: Option<String>,
    pub manager_id: Option<Option<String>>,
    pub leave_type: Option<LeaveType>,
    pub status: Option<LeaveStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub days: Option<NumberUpdate>,
    pub reason: Option<Option<String>>,
    pub manager_comment: Option<Option<String>>,
    pub reviewed_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateValues for LeaveUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("membership_id", &self.membership_id)
            .set("manager_id", &self.manager_id)
            .set("type", &self.leave_type)
            .set("status", &self.status)
            .set("start_date", &self.start_date)
            .set("end_date", &self.end_date)
            .number("days", &self.days)
            .set("reason", &self.reason)
            .set("manager_comment", &self.manager_comment)
            .set("reviewed_at", &self.reviewed_at);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaveInclude {
    pub membership: Option<Box<MembershipInclude>>,
    pub manager: Option<Box<UserInclude>>,
}

impl LeaveInclude {
    pub fn membership(mut self, include: MembershipInclude) -> Self {
        self.membership = Some(Box::new(include));
        self
    }

    pub fn manager(mut self, include: UserInclude) -> Self {
        self.manager = Some(Box::new(include));
        self
    }
}

#[async_trait]
impl Model for Leave {
    const NAME: &'static str = "Leave";
    const ID_FIELD: LeaveField = LeaveField::Id;
    const DEFAULT_ORDER: OrderBy<LeaveField> = OrderBy::asc(LeaveField::StartDate);

    type Field = LeaveField;
    type Where = LeaveWhereInput;
    type WhereUnique = LeaveWhereUniqueInput;
    type Create = LeaveCreateInput;
    type Update = LeaveUpdateInput;
    type Include = LeaveInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: LeaveField) -> SqlValue {
        match field {
            LeaveField::Id => self.id.to_sql_value(),
            LeaveField::MembershipId => self.membership_id.to_sql_value(),
            LeaveField::ManagerId => self.manager_id.to_sql_value(),
            LeaveField::LeaveType => self.leave_type.to_sql_value(),
            LeaveField::Status => self.status.to_sql_value(),
            LeaveField::StartDate => self.start_date.to_sql_value(),
            LeaveField::EndDate => self.end_date.to_sql_value(),
            LeaveField::Days => self.days.to_sql_value(),
            LeaveField::Reason => self.reason.to_sql_value(),
            LeaveField::ManagerComment => self.manager_comment.to_sql_value(),
            LeaveField::ReviewedAt => self.reviewed_at.to_sql_value(),
            LeaveField::CreatedAt => self.created_at.to_sql_value(),
            LeaveField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &LeaveInclude,
    ) -> Result<()> {
        if let Some(nested) = include.membership.as_deref() {
            let keys = distinct_keys(records.iter().map(|r| r.membership_id.clone()));
            let found = load_one::<Membership>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.membership = found.get(&record.membership_id).cloned().map(Box::new);
            }
        }
        if let Some(nested) = include.manager.as_deref() {
            let keys = distinct_keys(records.iter().filter_map(|r| r.manager_id.clone()));
            let found = load_one::<User>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.manager = record
                    .manager_id
                    .as_ref()
                    .and_then(|id| found.get(id))
                    .cloned()
                    .map(Box::new);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_manager_is_set_null_on_delete() {
        let sql = Leave::create_table_sql();
        assert!(sql.contains("FOREIGN KEY (manager_id) REFERENCES users(id) ON DELETE SET NULL"));
        assert!(sql.contains("status TEXT NOT NULL DEFAULT 'PENDING'"));
        assert!(sql.contains("days REAL NOT NULL"));
        assert_eq!(
            Leave::index_sql(),
            vec![
                "CREATE INDEX IF NOT EXISTS idx_leaves_membership_id ON leaves (membership_id)",
                "CREATE INDEX IF NOT EXISTS idx_leaves_manager_id ON leaves (manager_id)",
            ]
        );
    }

    #[test]
    fn test_overlap_style_filter() {
        let filter = LeaveWhereInput {
            membership_id: Some(StringFilter::eq("m1")),
            status: Some(EnumFilter::in_list([
                LeaveStatus::Pending,
                LeaveStatus::Approved,
            ])),
            start_date: Some(DateTimeFilter::lte(day(12))),
            end_date: Some(DateTimeFilter::gte(day(10))),
            ..Default::default()
        };
        let fragment = filter.to_fragment();
        assert_eq!(
            fragment.clauses,
            vec![
                "leaves.membership_id = ?",
                "leaves.status IN (?, ?)",
                "leaves.start_date <= ?",
                "leaves.end_date >= ?",
            ]
        );
        assert_eq!(
            fragment.values[3],
            SqlValue::String("2024-07-12T00:00:00.000Z".into())
        );
    }

    #[test]
    fn test_days_decrement() {
        let update = LeaveUpdateInput {
            days: Some(NumberUpdate::Decrement(0.5)),
            manager_id: Some(None),
            ..Default::default()
        };
        let (sql, values) = update.assignments().to_sql();
        assert_eq!(sql, "manager_id = ?, days = days - ?");
        assert_eq!(values, vec![SqlValue::Null, SqlValue::Float(0.5)]);
    }

    #[test]
    fn test_type_is_serialized_as_type() {
        let now = Utc::now();
        let leave = Leave {
            id: "l1".into(),
            membership_id: "m1".into(),
            manager_id: None,
            leave_type: LeaveType::Rtt,
            status: LeaveStatus::Pending,
            start_date: day(1),
            end_date: day(2),
            days: 2.0,
            reason: None,
            manager_comment: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
            membership: None,
            manager: None,
        };
        let json = serde_json::to_value(&leave).unwrap();
        assert_eq!(json["type"], "RTT");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["membershipId"], "m1");
    }
}
