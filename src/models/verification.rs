//! Verification model: short-lived tokens (email confirmation, password reset)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::db::sqlite_helpers::get_datetime;
use crate::orm::{
    Assignments, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema, DateTimeFilter,
    Delegate, FieldKind, FromSqlRow, InsertValues, Model, OrderBy, SqlFragment, SqlValue,
    StringFilter, ToSqlValue, UpdateValues, WhereBuilder, unique_fragment,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: String,
    /// What is being verified, e.g. an email address
    pub identifier: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type VerificationDelegate = Delegate<Verification>;
pub type VerificationOrderByInput = OrderBy<VerificationField>;

model_fields! {
    VerificationField => VERIFICATION_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        Identifier => ColumnDef::new("identifier", FieldKind::Text),
        Value => ColumnDef::new("value", FieldKind::Text),
        ExpiresAt => ColumnDef::new("expires_at", FieldKind::DateTime),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

impl DatabaseEntity for Verification {
    const TABLE_NAME: &'static str = "verifications";
}

impl DatabaseSchema for Verification {
    fn columns() -> &'static [ColumnDef] {
        VERIFICATION_COLUMNS
    }
}

impl FromSqlRow for Verification {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            value: row.try_get("value")?,
            expires_at: get_datetime(row, "expires_at")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerificationWhereInput {
    pub and: Vec<VerificationWhereInput>,
    pub or: Option<Vec<VerificationWhereInput>>,
    pub not: Vec<VerificationWhereInput>,
    pub id: Option<StringFilter>,
    pub identifier: Option<StringFilter>,
    pub value: Option<StringFilter>,
    pub expires_at: Option<DateTimeFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
}

impl DatabaseFilter for VerificationWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Verification::TABLE_NAME);
        w.field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("value", &self.value)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationWhereUniqueInput {
    Id(String),
}

impl DatabaseFilter for VerificationWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        let Self::Id(id) = self;
        unique_fragment(Verification::TABLE_NAME, &[("id", id.to_sql_value())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCreateInput {
    pub id: Option<String>,
    pub identifier: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCreateInput {
    pub fn new(
        identifier: impl Into<String>,
        value: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            identifier: identifier.into(),
            value: value.into(),
            expires_at,
        }
    }
}

impl InsertValues for VerificationCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("identifier", self.identifier.to_sql_value()),
            ("value", self.value.to_sql_value()),
            ("expires_at", self.expires_at.to_sql_value()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationUpdateInput {
    pub identifier: Option<String>,
    pub value: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdateValues for VerificationUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("identifier", &self.identifier)
            .set("value", &self.value)
            .set("expires_at", &self.expires_at);
        a
    }
}

#[async_trait]
impl Model for Verification {
    const NAME: &'static str = "Verification";
    const ID_FIELD: VerificationField = VerificationField::Id;
    const DEFAULT_ORDER: OrderBy<VerificationField> = OrderBy::asc(VerificationField::CreatedAt);

    type Field = VerificationField;
    type Where = VerificationWhereInput;
    type WhereUnique = VerificationWhereUniqueInput;
    type Create = VerificationCreateInput;
    type Update = VerificationUpdateInput;
    /// No relations
    type Include = ();

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: VerificationField) -> SqlValue {
        match field {
            VerificationField::Id => self.id.to_sql_value(),
            VerificationField::Identifier => self.identifier.to_sql_value(),
            VerificationField::Value => self.value.to_sql_value(),
            VerificationField::ExpiresAt => self.expires_at.to_sql_value(),
            VerificationField::CreatedAt => self.created_at.to_sql_value(),
            VerificationField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }
}
