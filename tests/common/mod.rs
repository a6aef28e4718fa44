//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use leave_client::Database;
use leave_client::models::{
    Company, CompanyCreateInput, LeaveBalanceCreateInput, LeaveType, Membership,
    MembershipCreateInput, MembershipRole, User, UserCreateInput,
};
use leave_client::orm::CreateArgs;
use tempfile::TempDir;

/// A schema-synced database in a temporary directory.
///
/// The directory lives as long as this value.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

impl std::ops::Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("leave.db").display());
    let db = Database::connect_url(&url).await.expect("connect");
    TestDb { db, _dir: dir }
}

pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub async fn create_user(db: &Database, name: &str, email: &str) -> User {
    db.users()
        .create(CreateArgs::new(UserCreateInput::new(name, email)))
        .await
        .expect("create user")
}

pub async fn create_company(db: &Database, name: &str, slug: &str) -> Company {
    db.companies()
        .create(CreateArgs::new(CompanyCreateInput::new(name, slug)))
        .await
        .expect("create company")
}

pub async fn create_membership(
    db: &Database,
    user: &User,
    company: &Company,
    role: MembershipRole,
) -> Membership {
    db.memberships()
        .create(CreateArgs::new(
            MembershipCreateInput::new(&user.id, &company.id).role(role),
        ))
        .await
        .expect("create membership")
}

pub async fn create_balance(
    db: &Database,
    membership: &Membership,
    leave_type: LeaveType,
    days: f64,
) {
    db.leave_balances()
        .create(CreateArgs::new(
            LeaveBalanceCreateInput::new(&membership.id, leave_type).remaining(days),
        ))
        .await
        .expect("create balance");
}

/// One company with a manager and an employee
pub struct Team {
    pub company: Company,
    pub manager: User,
    pub employee: User,
    pub manager_membership: Membership,
    pub employee_membership: Membership,
}

pub async fn create_team(db: &Database) -> Team {
    let company = create_company(db, "Acme", "acme").await;
    let manager = create_user(db, "Bob Manager", "bob@acme.test").await;
    let employee = create_user(db, "Chloe Employee", "chloe@acme.test").await;
    let manager_membership =
        create_membership(db, &manager, &company, MembershipRole::Manager).await;
    let employee_membership =
        create_membership(db, &employee, &company, MembershipRole::Employee).await;
    Team {
        company,
        manager,
        employee,
        manager_membership,
        employee_membership,
    }
}
