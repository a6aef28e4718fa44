//! Session model

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{User, UserInclude, UserWhereInput};
use crate::db::sqlite_helpers::get_datetime;
use crate::error::Result;
use crate::orm::relations::{distinct_keys, load_one};
use crate::orm::{
    Assignments, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema, DateTimeFilter,
    Delegate, Executor, FieldKind, ForeignKey, FromSqlRow, InsertValues, Model, OnDelete, OrderBy,
    RelationFilter, RelationLink, SqlFragment, SqlValue, StringFilter, ToSqlValue, UpdateValues,
    WhereBuilder, unique_fragment,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
}

pub type SessionDelegate = Delegate<Session>;
pub type SessionOrderByInput = OrderBy<SessionField>;

model_fields! {
    SessionField => SESSION_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        Token => ColumnDef::new("token", FieldKind::Text).unique(),
        ExpiresAt => ColumnDef::new("expires_at", FieldKind::DateTime),
        IpAddress => ColumnDef::new("ip_address", FieldKind::Text).nullable(),
        UserAgent => ColumnDef::new("user_agent", FieldKind::Text).nullable(),
        UserId => ColumnDef::new("user_id", FieldKind::Text),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const USER: RelationLink = RelationLink::new("users", "id", "user_id");

const FOREIGN_KEYS: &[ForeignKey] = &[ForeignKey::new("user_id", "users", OnDelete::Cascade)];

impl DatabaseEntity for Session {
    const TABLE_NAME: &'static str = "sessions";
}

impl DatabaseSchema for Session {
    fn columns() -> &'static [ColumnDef] {
        SESSION_COLUMNS
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        FOREIGN_KEYS
    }
}

impl FromSqlRow for Session {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            expires_at: get_datetime(row, "expires_at")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            user_id: row.try_get("user_id")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            user: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionWhereInput {
    pub and: Vec<SessionWhereInput>,
    pub or: Option<Vec<SessionWhereInput>>,
    pub not: Vec<SessionWhereInput>,
    pub id: Option<StringFilter>,
    pub token: Option<StringFilter>,
    pub expires_at: Option<DateTimeFilter>,
    pub ip_address: Option<StringFilter>,
    pub user_agent: Option<StringFilter>,
    pub user_id: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub user: Option<RelationFilter<UserWhereInput>>,
}

impl DatabaseFilter for SessionWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Session::TABLE_NAME);
        w.field("id", &self.id)
            .field("token", &self.token)
            .field("expires_at", &self.expires_at)
            .field("ip_address", &self.ip_address)
            .field("user_agent", &self.user_agent)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .relation(USER, &self.user)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionWhereUniqueInput {
    Id(String),
    Token(String),
}

impl DatabaseFilter for SessionWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        let (column, value) = match self {
            Self::Id(id) => ("id", id),
            Self::Token(token) => ("token", token),
        };
        unique_fragment(Session::TABLE_NAME, &[(column, value.to_sql_value())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCreateInput {
    pub id: Option<String>,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: String,
}

impl SessionCreateInput {
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            token: token.into(),
            expires_at,
            ip_address: None,
            user_agent: None,
            user_id: user_id.into(),
        }
    }
}

impl InsertValues for SessionCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("token", self.token.to_sql_value()),
            ("expires_at", self.expires_at.to_sql_value()),
            ("ip_address", self.ip_address.to_sql_value()),
            ("user_agent", self.user_agent.to_sql_value()),
            ("user_id", self.user_id.to_sql_value()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdateInput {
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_address: Option<Option<String>>,
    pub user_agent: Option<Option<String>>,
    pub user_id: Option<String>,
}

impl UpdateValues for SessionUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("token", &self.token)
            .set("expires_at", &self.expires_at)
            .set("ip_address", &self.ip_address)
            .set("user_agent", &self.user_agent)
            .set("user_id", &self.user_id);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionInclude {
    pub user: Option<Box<UserInclude>>,
}

impl SessionInclude {
    pub fn user(mut self, include: UserInclude) -> Self {
        self.user = Some(Box::new(include));
        self
    }
}

#[async_trait]
impl Model for Session {
    const NAME: &'static str = "Session";
    const ID_FIELD: SessionField = SessionField::Id;
    const DEFAULT_ORDER: OrderBy<SessionField> = OrderBy::asc(SessionField::CreatedAt);

    type Field = SessionField;
    type Where = SessionWhereInput;
    type WhereUnique = SessionWhereUniqueInput;
    type Create = SessionCreateInput;
    type Update = SessionUpdateInput;
    type Include = SessionInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: SessionField) -> SqlValue {
        match field {
            SessionField::Id => self.id.to_sql_value(),
            SessionField::Token => self.token.to_sql_value(),
            SessionField::ExpiresAt => self.expires_at.to_sql_value(),
            SessionField::IpAddress => self.ip_address.to_sql_value(),
            SessionField::UserAgent => self.user_agent.to_sql_value(),
            SessionField::UserId => self.user_id.to_sql_value(),
            SessionField::CreatedAt => self.created_at.to_sql_value(),
            SessionField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &SessionInclude,
    ) -> Result<()> {
        if let Some(nested) = include.user.as_deref() {
            let keys = distinct_keys(records.iter().map(|r| r.user_id.clone()));
            let found = load_one::<User>(executor, nested, &keys).await?;
            for record in records.iter_mut() {
                record.user = found.get(&record.user_id).cloned().map(Box::new);
            }
        }
        Ok(())
    }
}
