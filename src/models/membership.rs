//! Membership model: a user's seat in a company

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{
    Company, CompanyInclude, CompanyWhereInput, Leave, LeaveBalance, LeaveBalanceField,
    LeaveBalanceWhereInput, LeaveField, LeaveWhereInput, MembershipRole, User, UserInclude,
    UserWhereInput,
};
use crate::db::sqlite_helpers::{get_datetime, get_enum};
use crate::error::Result;
use crate::orm::relations::{distinct_keys, load_many, load_one};
use crate::orm::{
    Assignments, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema, DateTimeFilter,
    Delegate, EnumFilter, Executor, FieldKind, FindManyArgs, ForeignKey, FromSqlRow, InsertValues,
    ListRelationFilter, Model, OnDelete, OrderBy, RelationFilter, RelationLink, SqlFragment,
    SqlValue, StringFilter, ToSqlValue, UpdateValues, WhereBuilder, unique_fragment,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub company_id: String,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Box<Company>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaves: Option<Vec<Leave>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balances: Option<Vec<LeaveBalance>>,
}

pub type MembershipDelegate = Delegate<Membership>;
pub type MembershipOrderByInput = OrderBy<MembershipField>;

model_fields! {
    /// Scalar columns of [`Membership`]
    MembershipField => MEMBERSHIP_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        UserId => ColumnDef::new("user_id", FieldKind::Text),
        CompanyId => ColumnDef::new("company_id", FieldKind::Text),
        Role => ColumnDef::new("role", FieldKind::Enum).default_value("'EMPLOYEE'"),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const USER: RelationLink = RelationLink::new("users", "id", "user_id");
const COMPANY: RelationLink = RelationLink::new("companies", "id", "company_id");
const LEAVES: RelationLink = RelationLink::new("leaves", "membership_id", "id");
const BALANCES: RelationLink = RelationLink::new("leave_balances", "membership_id", "id");

const FOREIGN_KEYS: &[ForeignKey] = &[
    ForeignKey::new("user_id", "users", OnDelete::Cascade),
    ForeignKey::new("company_id", "companies", OnDelete::Cascade),
];

impl DatabaseEntity for Membership {
    const TABLE_NAME: &'static str = "memberships";
}

impl DatabaseSchema for Membership {
    fn columns() -> &'static [ColumnDef] {
        MEMBERSHIP_COLUMNS
    }

    fn unique_constraints() -> &'static [&'static [&'static str]] {
        &[&["user_id", "company_id"]]
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        FOREIGN_KEYS
    }
}

impl FromSqlRow for Membership {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            company_id: row.try_get("company_id")?,
            role: get_enum(row, "role")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            user: None,
            company: None,
            leaves: None,
            balances: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipWhereInput {
    pub and: Vec<MembershipWhereInput>,
    pub or: Option<Vec<MembershipWhereInput>>,
    pub not: Vec<MembershipWhereInput>,
    pub id: Option<StringFilter>,
    pub user_id: Option<StringFilter>,
    pub company_id: Option<StringFilter>,
    pub role: Option<EnumFilter<MembershipRole>>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub user: Option<RelationFilter<UserWhereInput>>,
    pub company: Option<RelationFilter<CompanyWhereInput>>,
    pub leaves: Option<ListRelationFilter<LeaveWhereInput>>,
    pub balances: Option<ListRelationFilter<LeaveBalanceWhereInput>>,
}

impl DatabaseFilter for MembershipWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Membership::TABLE_NAME);
        w.field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("company_id", &self.company_id)
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .relation(USER, &self.user)
            .relation(COMPANY, &self.company)
            .list_relation(LEAVES, &self.leaves)
            .list_relation(BALANCES, &self.balances)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MembershipWhereUniqueInput {
    Id(String),
    /// The `(user_id, company_id)` compound key
    UserIdCompanyId { user_id: String, company_id: String },
}

impl MembershipWhereUniqueInput {
    pub fn user_company(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self::UserIdCompanyId {
            user_id: user_id.into(),
            company_id: company_id.into(),
        }
    }
}

impl DatabaseFilter for MembershipWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        match self {
            Self::Id(id) => unique_fragment(Membership::TABLE_NAME, &[("id", id.to_sql_value())]),
            Self::UserIdCompanyId {
                user_id,
                company_id,
            } => unique_fragment(
                Membership::TABLE_NAME,
                &[
                    ("user_id", user_id.to_sql_value()),
                    ("company_id", company_id.to_sql_value()),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipCreateInput {
    pub id: Option<String>,
    pub user_id: String,
    pub company_id: String,
    /// Column default (EMPLOYEE) when unset
    pub role: Option<MembershipRole>,
}

impl MembershipCreateInput {
    pub fn new(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            company_id: company_id.into(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role: MembershipRole) -> Self {
        self.role = Some(role);
        self
    }
}

impl InsertValues for MembershipCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        let mut values = vec![
            ("user_id", self.user_id.to_sql_value()),
            ("company_id", self.company_id.to_sql_value()),
        ];
        if let Some(role) = self.role {
            values.push(("role", role.to_sql_value()));
        }
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipUpdateInput {
    pub user_id: Option<String>,
    pub company_id: Option<String>,
    pub role: Option<MembershipRole>,
}

impl UpdateValues for MembershipUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("user_id", &self.user_id)
            .set("company_id", &self.company_id)
            .set("role", &self.role);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipInclude {
    pub user: Option<Box<UserInclude>>,
    pub company: Option<Box<CompanyInclude>>,
    pub leaves: Option<Box<FindManyArgs<Leave>>>,
    pub balances: Option<Box<FindManyArgs<LeaveBalance>>>,
}

impl MembershipInclude {
    pub fn user(mut self, include: UserInclude) -> Self {
        self.user = Some(Box::new(include));
        self
    }

    pub fn company(mut self, include: CompanyInclude) -> Self {
        self.company = Some(Box::new(include));
        self
    }

    pub fn leaves(mut self, args: FindManyArgs<Leave>) -> Self {
        self.leaves = Some(Box::new(args));
        self
    }

    pub fn balances(mut self, args: FindManyArgs<LeaveBalance>) -> Self {
        self.balances = Some(Box::new(args));
        self
    }
}

#[async_trait]
impl Model for Membership {
    const NAME: &'static str = "Membership";
    const ID_FIELD: MembershipField = MembershipField::Id;
    const DEFAULT_ORDER: OrderBy<MembershipField> = OrderBy::asc(MembershipField::CreatedAt);

    type Field = MembershipField;
    type Where = MembershipWhereInput;
    type WhereUnique = MembershipWhereUniqueInput;
    type Create = MembershipCreateInput;
    type Update = MembershipUpdateInput;
    type Include = MembershipInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: MembershipField) -> SqlValue {
        match field {
            MembershipField::Id => self.id.to_sql_value(),
            MembershipField::UserId => self.user_id.to_sql_value(),
            MembershipField::CompanyId => self.company_id.to_sql_value(),
            MembershipField::Role => self.role.to_sql_value(),
            MembershipField::CreatedAt => self.created_at.to_sql_value(),
            MembershipField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &MembershipInclude,
    ) -> Result<()> {
        if let Some(nested) = include.user.as_deref() {
            let keys = distinct_keys(records.iter().map(|r| r.user_id.clone()));
            let found = load_one::<User>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.user = found.get(&record.user_id).cloned().map(Box::new);
            }
        }
        if let Some(nested) = include.company.as_deref() {
            let keys = distinct_keys(records.iter().map(|r| r.company_id.clone()));
            let found = load_one::<Company>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.company = found.get(&record.company_id).cloned().map(Box::new);
            }
        }

        let ids = distinct_keys(records.iter().map(|r| r.id.clone()));
        if let Some(args) = include.leaves.as_deref() {
            let mut found =
                load_many::<Leave>(executor, args, LeaveField::MembershipId, &ids).await?;
            for record in records.iter_mut() {
                record.leaves = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = include.balances.as_deref() {
            let mut found =
                load_many::<LeaveBalance>(executor, args, LeaveBalanceField::MembershipId, &ids)
                    .await?;
            for record in records.iter_mut() {
                record.balances = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}
