//! Company model: the tenant that employs members

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{Membership, MembershipField, MembershipWhereInput};
use crate::db::sqlite_helpers::get_datetime;
use crate::error::Result;
use crate::orm::relations::{distinct_keys, load_many};
use crate::orm::{
    Assignments, ColumnDef, DatabaseEntity, DatabaseFilter, DatabaseSchema, DateTimeFilter,
    Delegate, Executor, FieldKind, FindManyArgs, FromSqlRow, InsertValues, ListRelationFilter,
    Model, OrderBy, RelationLink, SqlFragment, SqlValue, StringFilter, ToSqlValue, UpdateValues,
    WhereBuilder, unique_fragment,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    /// URL-safe unique handle
    pub slug: String,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memberships: Option<Vec<Membership>>,
}

pub type CompanyDelegate = Delegate<Company>;
pub type CompanyOrderByInput = OrderBy<CompanyField>;

model_fields! {
    /// Scalar columns of [`Company`]
    CompanyField => COMPANY_COLUMNS {
        Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
        Name => ColumnDef::new("name", FieldKind::Text),
        Slug => ColumnDef::new("slug", FieldKind::Text).unique(),
        Logo => ColumnDef::new("logo", FieldKind::Text).nullable(),
        CreatedAt => ColumnDef::new("created_at", FieldKind::DateTime),
        UpdatedAt => ColumnDef::new("updated_at", FieldKind::DateTime),
    }
}

const MEMBERSHIPS: RelationLink = RelationLink::new("memberships", "company_id", "id");

impl DatabaseEntity for Company {
    const TABLE_NAME: &'static str = "companies";
}

impl DatabaseSchema for Company {
    fn columns() -> &'static [ColumnDef] {
        COMPANY_COLUMNS
    }
}

impl FromSqlRow for Company {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            logo: row.try_get("logo")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
            memberships: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompanyWhereInput {
    pub and: Vec<CompanyWhereInput>,
    pub or: Option<Vec<CompanyWhereInput>>,
    pub not: Vec<CompanyWhereInput>,
    pub id: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub slug: Option<StringFilter>,
    pub logo: Option<StringFilter>,
    pub created_at: Option<DateTimeFilter>,
    pub updated_at: Option<DateTimeFilter>,
    pub memberships: Option<ListRelationFilter<MembershipWhereInput>>,
}

impl DatabaseFilter for CompanyWhereInput {
    fn to_fragment(&self) -> SqlFragment {
        let mut w = WhereBuilder::new(Company::TABLE_NAME);
        w.field("id", &self.id)
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("logo", &self.logo)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .list_relation(MEMBERSHIPS, &self.memberships)
            .and(&self.and)
            .or(&self.or)
            .not(&self.not);
        w.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompanyWhereUniqueInput {
    Id(String),
    Slug(String),
}

impl DatabaseFilter for CompanyWhereUniqueInput {
    fn to_fragment(&self) -> SqlFragment {
        let (column, value) = match self {
            Self::Id(id) => ("id", id),
            Self::Slug(slug) => ("slug", slug),
        };
        unique_fragment(Company::TABLE_NAME, &[(column, value.to_sql_value())])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyCreateInput {
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
}

impl CompanyCreateInput {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            ..Default::default()
        }
    }
}

impl InsertValues for CompanyCreateInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.to_sql_value()),
            ("slug", self.slug.to_sql_value()),
            ("logo", self.logo.to_sql_value()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyUpdateInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub logo: Option<Option<String>>,
}

impl UpdateValues for CompanyUpdateInput {
    fn assignments(&self) -> Assignments {
        let mut a = Assignments::new();
        a.set("name", &self.name)
            .set("slug", &self.slug)
            .set("logo", &self.logo);
        a
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompanyInclude {
    pub memberships: Option<Box<FindManyArgs<Membership>>>,
}

impl CompanyInclude {
    pub fn memberships(mut self, args: FindManyArgs<Membership>) -> Self {
        self.memberships = Some(Box::new(args));
        self
    }
}

#[async_trait]
impl Model for Company {
    const NAME: &'static str = "Company";
    const ID_FIELD: CompanyField = CompanyField::Id;
    const DEFAULT_ORDER: OrderBy<CompanyField> = OrderBy::asc(CompanyField::CreatedAt);

    type Field = CompanyField;
    type Where = CompanyWhereInput;
    type WhereUnique = CompanyWhereUniqueInput;
    type Create = CompanyCreateInput;
    type Update = CompanyUpdateInput;
    type Include = CompanyInclude;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: CompanyField) -> SqlValue {
        match field {
            CompanyField::Id => self.id.to_sql_value(),
            CompanyField::Name => self.name.to_sql_value(),
            CompanyField::Slug => self.slug.to_sql_value(),
            CompanyField::Logo => self.logo.to_sql_value(),
            CompanyField::CreatedAt => self.created_at.to_sql_value(),
            CompanyField::UpdatedAt => self.updated_at.to_sql_value(),
        }
    }

    async fn load_relations(
        records: &mut [Self],
        executor: &Executor,
        include: &CompanyInclude,
    ) -> Result<()> {
        if let Some(args) = include.memberships.as_deref() {
            let ids = distinct_keys(records.iter().map(|r| r.id.clone()));
            let mut found =
                load_many::<Membership>(executor, args, MembershipField::CompanyId, &ids).await?;
            for record in records.iter_mut() {
                record.memberships = Some(found.remove(&record.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
impl Company {
    pub(crate) fn sample(id: &str, name: &str, slug: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            logo: None,
            created_at: now,
            updated_at: now,
            memberships: None,
        }
    }
}
