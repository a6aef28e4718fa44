//! User model

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{
    Account, AccountField, AccountWhereInput, Leave, LeaveField, LeaveWhereInput, Membership,
    MembershipField, MembershipWhereInput, Session, SessionField, SessionWhereInput,
};
use crate::db::sqlite_helpers::{get_bool, get_datetime};
use crate::error::Result;
use crate::orm::relations::{distinct_keys, load_many};
use crate::orm::{
    Assignments, BoolFilter, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema,
    DateTimeFilter, Delegate, Executor, FieldKind, FindManyArgs, FromSqlRow, InsertValues,
    ListRelationFilter, Model, OrderBy, RelationLink, SqlFragment, SqlValue, StringFilter,
    ToSqlValue, UpdateValues, WhereBuilder, unique_fragment,
};

/// An authenticated person. May belong to several companies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memberships: Option<Vec<Membership>>,
    /// Leaves this user reviews as manager
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_leaves: Option<Vec<Leave>>,
}

pub type UserDelegate = Delegate<User>;
pub type UserOrderByInput = OrderBy<UserField>;

model_fields! {
    /// Scalar columns of [`User`]
    UserField => USER_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        Name => ColumnDef::new("name", FieldKind::Text),
        Email => ColumnDef::new("email", FieldKind::Text).unique(),
        EmailVerified => ColumnDef::new("email_verified", FieldKind::Boolean).default_value("0"),
        Image => ColumnDef::new("image", FieldKind::Text).nullable(),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const SESSIONS: RelationLink = RelationLink::new("sessions", "user_id", "id");
const ACCOUNTS: RelationLink = RelationLink::new("accounts", "user_id", "id");
const MEMBERSHIPS: RelationLink = RelationLink::new("memberships", "user_id", "id");
const MANAGED_LEAVES: RelationLink = RelationLink::new("leaves", "manager_id", "id");

impl DatabaseEntity for User {
    const TABLE_NAME: &'static str = "users";
}

impl DatabaseSchema for User {
    fn columns() -> &'static [ColumnDef] {
        USER_COLUMNS
    }
}

impl FromSqlRow for User {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            email_verified: get_bool(row, "email_verified")?,
            image: row.try_get("image")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            sessions: None,
            accounts: None,
            memberships: None,
            managed_leaves: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserWhereInput {
    pub and: Vec<UserWhereInput>,
    pub or: Option<Vec<UserWhereInput>>,
    pub not: Vec<UserWhereInput>,
    pub id: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub email_verified: Option<BoolFilter>,
    pub image: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub sessions: Option<ListRelationFilter<SessionWhereInput>>,
    pub accounts: Option<ListRelationFilter<AccountWhereInput>>,
    pub memberships: Option<ListRelationFilter<MembershipWhereInput>>,
    pub managed_leaves: Option<ListRelationFilter<LeaveWhereInput>>,
}

impl DatabaseFilter for UserWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(User::TABLE_NAME);
        w.field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("email_verified", &self.email_verified)
            .field("image", &self.image)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .list_relation(SESSIONS, &self.sessions)
            .list_relation(ACCOUNTS, &self.accounts)
            .list_relation(MEMBERSHIPS, &self.memberships)
            .list_relation(MANAGED_LEAVES, &self.managed_leaves)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserWhereUniqueInput {
    Id(String),
    Email(String),
}

impl DatabaseFilter for UserWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        match self {
            Self::Id(id) => unique_fragment(User::TABLE_NAME, &[("id", id.to_sql_value())]),
            Self::Email(email) => {
                unique_fragment(User::TABLE_NAME, &[("email", email.to_sql_value())])
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserCreateInput {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub email_verified: Option<bool>,
    pub image: Option<String>,
}

impl UserCreateInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

impl InsertValues for UserCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        let mut values = vec![
            ("name", self.name.to_sql_value()),
            ("email", self.email.to_sql_value()),
            ("image", self.image.to_sql_value()),
        ];
        if let Some(verified) = self.email_verified {
            values.push(("email_verified", verified.to_sql_value()));
        }
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdateInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub image: Option<Option<String>>,
}

impl UpdateValues for UserUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("name", &self.name)
            .set("email", &self.email)
            .set("email_verified", &self.email_verified)
            .set("image", &self.image);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserInclude {
    pub sessions: Option<Box<FindManyArgs<Session>>>,
    pub accounts: Option<Box<FindManyArgs<Account>>>,
    pub memberships: Option<Box<FindManyArgs<Membership>>>,
    pub managed_leaves: Option<Box<FindManyArgs<Leave>>>,
}

impl UserInclude {
    pub fn sessions(mut self, args: FindManyArgs<Session>) -> Self {
        self.sessions = Some(Box::new(args));
        self
    }

    pub fn accounts(mut self, args: FindManyArgs<Account>) -> Self {
        self.accounts = Some(Box::new(args));
        self
    }

    pub fn memberships(mut self, args: FindManyArgs<Membership>) -> Self {
        self.memberships = Some(Box::new(args));
        self
    }

    pub fn managed_leaves(mut self, args: FindManyArgs<Leave>) -> Self {
        self.managed_leaves = Some(Box::new(args));
        self
    }
}

#[async_trait]
impl Model for User {
    const NAME: &'static str = "User";
    const ID_FIELD: UserField = UserField::Id;
    const DEFAULT_ORDER: OrderBy<UserField> = OrderBy::asc(UserField::CreatedAt);

    type Field = UserField;
    type Where = UserWhereInput;
    type WhereUnique = UserWhereUniqueInput;
    type Create = UserCreateInput;
    type Update = UserUpdateInput;
    type Include = UserInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: UserField) -> SqlValue {
        match field {
            UserField::Id => self.id.to_sql_value(),
            UserField::Name => self.name.to_sql_value(),
            UserField::Email => self.email.to_sql_value(),
            UserField::EmailVerified => self.email_verified.to_sql_value(),
            UserField::Image => self.image.to_sql_value(),
            UserField::CreatedAt => self.created_at.to_sql_value(),
            UserField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &UserInclude,
    ) -> Result<()> {
        let ids = distinct_keys(records.iter().map(|r| r.id.clone()));

        if let Some(args) = include.sessions.as_deref() {
            let mut found = load_many::<Session>(executor, args, SessionField::UserId, &ids).await?;
            for record in records.iter_mut() {
                record.sessions = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = include.accounts.as_deref() {
            let mut found = load_many::<Account>(executor, args, AccountField::UserId, &ids).await?;
            for record in records.iter_mut() {
                record.accounts = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = include.memberships.as_deref() {
            let mut found =
                load_many::<Membership>(executor, args, MembershipField::UserId, &ids).await?;
            for record in records.iter_mut() {
                record.memberships = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        if let Some(args) = include.managed_leaves.as_deref() {
            let mut found = load_many::<Leave>(executor, args, LeaveField::ManagerId, &ids).await?;
            for record in records.iter_mut() {
                record.managed_leaves = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::orm::ScalarField;

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            User::create_table_sql(),
            "CREATE TABLE IF NOT EXISTS users (\n  id TEXT PRIMARY KEY,\n  name TEXT NOT NULL,\n  email TEXT NOT NULL UNIQUE,\n  email_verified INTEGER NOT NULL DEFAULT 0,\n  image TEXT,\n  created_at TEXT NOT NULL,\n  updated_at TEXT NOT NULL\n)"
        );
    }

    #[test]
    fn test_fields_match_columns() {
        assert_eq!(UserField::ALL.len(), USER_COLUMNS.len());
        assert_eq!(UserField::EmailVerified.column(), "email_verified");
        assert_eq!(UserField::Image.kind(), FieldKind::Text);
    }

    #[test]
    fn test_where_with_relation() {
        let filter = UserWhereInput {
            email: Some(StringFilter::ends_with("@acme.test")),
            memberships: Some(ListRelationFilter::some(MembershipWhereInput {
                company_id: Some(StringFilter::eq("c1")),
                ..Default::default()
            })),
            ..Default::default()
        };
        let fragment = filter.to_fragment();
        assert_eq!(
            fragment.clauses,
            vec![
                "substr(users.email, -length(?)) = ?",
                "EXISTS (SELECT 1 FROM memberships WHERE memberships.user_id = users.id AND (memberships.company_id = ?))",
            ]
        );
        assert_eq!(fragment.values.len(), 3);
    }

    #[test]
    fn test_update_only_sets_touched_fields() {
        let update = UserUpdateInput {
            image: Some(None),
            ..Default::default()
        };
        let (sql, values) = update.assignments().to_sql();
        assert_eq!(sql, "image = ?");
        assert_eq!(values, vec![SqlValue::Null]);
    }
}
