//! Demo data for a fresh database.
//!
//! Inserts one company with an owner, a manager and an employee, their
//! memberships and PAID/RTT balances. Every row goes through `upsert`
//! on a unique key with an empty update, so re-runs are idempotent and
//! leave existing rows (balances included) untouched.

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use super::Database;
use crate::error::{ClientError, Result};
use crate::models::{
    Company, CompanyCreateInput, CompanyUpdateInput, CompanyWhereUniqueInput, LeaveBalance,
    LeaveBalanceCreateInput, LeaveBalanceUpdateInput, LeaveBalanceWhereUniqueInput, LeaveType,
    Membership, MembershipCreateInput, MembershipRole, MembershipUpdateInput,
    MembershipWhereUniqueInput, User, UserCreateInput, UserUpdateInput, UserWhereUniqueInput,
};
use crate::orm::UpsertArgs;

pub const DEMO_COMPANY_SLUG: &str = "acme";

struct DemoUser {
    name: &'static str,
    email: &'static str,
    role: MembershipRole,
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        name: "Alice Owner",
        email: "owner@acme.test",
        role: MembershipRole::Owner,
    },
    DemoUser {
        name: "Bob Manager",
        email: "manager@acme.test",
        role: MembershipRole::Manager,
    },
    DemoUser {
        name: "Chloe Employee",
        email: "employee@acme.test",
        role: MembershipRole::Employee,
    },
];

/// Opening balances: 25 paid days, 10 RTT days
const DEMO_BALANCES: &[(LeaveType, f64)] = &[(LeaveType::Paid, 25.0), (LeaveType::Rtt, 10.0)];

/// Result of running seed operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub tables_seeded: Vec<String>,
    pub errors: Vec<String>,
}

async fn seed_company(db: &Database) -> Result<Company> {
    db.companies()
        .upsert(UpsertArgs::new(
            CompanyWhereUniqueInput::Slug(DEMO_COMPANY_SLUG.to_string()),
            CompanyCreateInput::new("Acme", DEMO_COMPANY_SLUG),
            CompanyUpdateInput::default(),
        ))
        .await
}

async fn seed_users(db: &Database) -> Result<Vec<User>> {
    let delegate = db.users();
    try_join_all(DEMO_USERS.iter().map(|demo| {
        let mut create = UserCreateInput::new(demo.name, demo.email);
        create.email_verified = Some(true);
        delegate.upsert(UpsertArgs::new(
            UserWhereUniqueInput::Email(demo.email.to_string()),
            create,
            UserUpdateInput::default(),
        ))
    }))
    .await
}

async fn seed_memberships(
    db: &Database,
    company: &Company,
    users: &[User],
) -> Result<Vec<Membership>> {
    let delegate = db.memberships();
    try_join_all(users.iter().zip(DEMO_USERS).map(|(user, demo)| {
        delegate.upsert(UpsertArgs::new(
            MembershipWhereUniqueInput::user_company(&user.id, &company.id),
            MembershipCreateInput::new(&user.id, &company.id).role(demo.role),
            MembershipUpdateInput::default(),
        ))
    }))
    .await
}

async fn seed_balances(db: &Database, memberships: &[Membership]) -> Result<Vec<LeaveBalance>> {
    let delegate = db.leave_balances();
    let delegate = &delegate;
    let upserts = memberships.iter().flat_map(|membership| {
        DEMO_BALANCES.iter().map(move |&(leave_type, days)| {
            delegate.upsert(UpsertArgs::new(
                LeaveBalanceWhereUniqueInput::membership_type(&membership.id, leave_type),
                LeaveBalanceCreateInput::new(&membership.id, leave_type).remaining(days),
                LeaveBalanceUpdateInput::default(),
            ))
        })
    });
    try_join_all(upserts).await
}

async fn seed_demo(db: Database) -> Result<Vec<(&'static str, usize)>, ClientError> {
    let company = seed_company(&db).await?;
    let users = seed_users(&db).await?;
    let memberships = seed_memberships(&db, &company, &users).await?;
    let balances = seed_balances(&db, &memberships).await?;

    Ok(vec![
        ("companies", 1),
        ("users", users.len()),
        ("memberships", memberships.len()),
        ("leave_balances", balances.len()),
    ])
}

/// Seed the demo tenant in one transaction
pub async fn run_seeds(db: &Database) -> SeedResult {
    let mut result = SeedResult::default();

    match db.transaction(seed_demo).await {
        Ok(counts) => {
            for (table, count) in counts {
                debug!(table = table, count = count, "Seeded table");
                result.tables_seeded.push(format!("{} ({} rows)", table, count));
            }
        }
        Err(e) => {
            let msg = format!("Seed demo data: {}", e);
            warn!("{}", msg);
            result.errors.push(msg);
        }
    }

    if !result.tables_seeded.is_empty() {
        info!(tables = ?result.tables_seeded, "Pre-seed data applied");
    }

    result
}
