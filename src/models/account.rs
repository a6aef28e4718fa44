//! Account model: a credential or OAuth link of a user

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{User, UserInclude, UserWhereInput};
use crate::db::sqlite_helpers::{get_datetime, get_datetime_opt};
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
pub struct Account {
    pub id: String,
    /// Identifier of the account at the provider
    pub account_id: String,
    /// `credential`, `google`, ...
    pub provider_id: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// Password hash for the credential provider
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
}

pub type AccountDelegate = Delegate<Account>;
pub type AccountOrderByInput = OrderBy<AccountField>;

model_fields! {
    AccountField => ACCOUNT_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        AccountId => ColumnDef::new("account_id", FieldKind::Text),
        ProviderId => ColumnDef::new("provider_id", FieldKind::Text),
        UserId => ColumnDef::new("user_id", FieldKind::Text),
        AccessToken => ColumnDef::new("access_token", FieldKind::Text).nullable(),
        RefreshToken => ColumnDef::new("refresh_token", FieldKind::Text).nullable(),
        IdToken => ColumnDef::new("id_token", FieldKind::Text).nullable(),
        AccessTokenExpiresAt => ColumnDef::new("access_token_expires_at", FieldKind::DateTime).nullable(),
        RefreshTokenExpiresAt => ColumnDef::new("refresh_token_expires_at", FieldKind::DateTime).nullable(),
        Scope => ColumnDef::new("scope", FieldKind::Text).nullable(),
        Password => ColumnDef::new("password", FieldKind::Text).nullable(),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const USER: RelationLink = RelationLink::new("users", "id", "user_id");

const FOREIGN_KEYS: &[ForeignKey] = &[ForeignKey::new("user_id", "users", OnDelete::Cascade)];

impl DatabaseEntity for Account {
    const TABLE_NAME: &'static str = "accounts";
}

impl DatabaseSchema for Account {
    fn columns() -> &'static [ColumnDef] {
        ACCOUNT_COLUMNS
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        FOREIGN_KEYS
    }
}

impl FromSqlRow for Account {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            provider_id: row.try_get("provider_id")?,
            user_id: row.try_get("user_id")?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            id_token: row.try_get("id_token")?,
            access_token_expires_at: get_datetime_opt(row, "access_token_expires_at")?,
            refresh_token_expires_at: get_datetime_opt(row, "refresh_token_expires_at")?,
            scope: row.try_get("scope")?,
            password: row.try_get("password")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            user: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountWhereInput {
    pub and: Vec<AccountWhereInput>,
    pub or: Option<Vec<AccountWhereInput>>,
    pub not: Vec<AccountWhereInput>,
    pub id: Option<StringFilter>,
    pub account_id: Option<StringFilter>,
    pub provider_id: Option<StringFilter>,
    pub user_id: Option<StringFilter>,
    pub access_token: Option<StringFilter>,
    pub refresh_token: Option<StringFilter>,
    pub id_token: Option<StringFilter>,
    pub access_token_expires_at: Option<DateTimeFilter>,
    pub refresh_token_expires_at: Option<DateTimeFilter>,
    pub scope: Option<StringFilter>,
    pub password: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub user: Option<RelationFilter<UserWhereInput>>,
}

impl DatabaseFilter for AccountWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Account::TABLE_NAME);
        w.field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("provider_id", &self.provider_id)
            .field("user_id", &self.user_id)
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token)
            .field("id_token", &self.id_token)
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("scope", &self.scope)
            .field("password", &self.password)
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
pub enum AccountWhereUniqueInput {
    Id(String),
}

impl DatabaseFilter for AccountWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        let Self::Id(id) = self;
        unique_fragment(Account::TABLE_NAME, &[("id", id.to_sql_value())])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountCreateInput {
    pub id: Option<String>,
    pub account_id: String,
    pub provider_id: String,
    pub user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub password: Option<String>,
}

impl AccountCreateInput {
    pub fn new(
        user_id: impl Into<String>,
        provider_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            provider_id: provider_id.into(),
            account_id: account_id.into(),
            ..Default::default()
        }
    }
}

impl InsertValues for AccountCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("account_id", self.account_id.to_sql_value()),
            ("provider_id", self.provider_id.to_sql_value()),
            ("user_id", self.user_id.to_sql_value()),
            ("access_token", self.access_token.to_sql_value()),
            ("refresh_token", self.refresh_token.to_sql_value()),
            ("id_token", self.id_token.to_sql_value()),
            ("access_token_expires_at", self.access_token_expires_at.to_sql_value()),
            ("refresh_token_expires_at", self.refresh_token_expires_at.to_sql_value()),
            ("scope", self.scope.to_sql_value()),
            ("password", self.password.to_sql_value()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountUpdateInput {
    pub account_id: Option<String>,
    pub provider_id: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<Option<String>>,
    pub refresh_token: Option<Option<String>>,
    pub id_token: Option<Option<String>>,
    pub access_token_expires_at: Option<Option<DateTime<Utc>>>,
    pub refresh_token_expires_at: Option<Option<DateTime<Utc>>>,
    pub scope: Option<Option<String>>,
    pub password: Option<Option<String>>,
}

impl UpdateValues for AccountUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("account_id", &self.account_id)
            .set("provider_id", &self.provider_id)
            .set("user_id", &self.user_id)
            .set("access_token", &self.access_token)
            .set("refresh_token", &self.refresh_token)
            .set("id_token", &self.id_token)
            .set("access_token_expires_at", &self.access_token_expires_at)
            .set("refresh_token_expires_at", &self.refresh_token_expires_at)
            .set("scope", &self.scope)
            .set("password", &self.password);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountInclude {
    pub user: Option<Box<UserInclude>>,
}

impl AccountInclude {
    pub fn user(mut self, include: UserInclude) -> Self {
        self.user = Some(Box::new(include));
        self
    }
}

#[async_trait]
impl Model for Account {
    const NAME: &'static str = "Account";
    const ID_FIELD: AccountField = AccountField::Id;
    const DEFAULT_ORDER: OrderBy<AccountField> = OrderBy::asc(AccountField::CreatedAt);

    type Field = AccountField;
    type Where = AccountWhereInput;
    type WhereUnique = AccountWhereUniqueInput;
    type Create = AccountCreateInput;
    type Update = AccountUpdateInput;
    type Include = AccountInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: AccountField) -> SqlValue {
        match field {
            AccountField::Id => self.id.to_sql_value(),
            AccountField::AccountId => self.account_id.to_sql_value(),
            AccountField::ProviderId => self.provider_id.to_sql_value(),
            AccountField::UserId => self.user_id.to_sql_value(),
            AccountField::AccessToken => self.access_token.to_sql_value(),
            AccountField::RefreshToken => self.refresh_token.to_sql_value(),
            AccountField::IdToken => self.id_token.to_sql_value(),
            AccountField::AccessTokenExpiresAt => self.access_token_expires_at.to_sql_value(),
            AccountField::RefreshTokenExpiresAt => self.refresh_token_expires_at.to_sql_value(),
            AccountField::Scope => self.scope.to_sql_value(),
            AccountField::Password => self.password.to_sql_value(),
            AccountField::CreatedAt => self.created_at.to_sql_value(),
            AccountField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &AccountInclude,
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
