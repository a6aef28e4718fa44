//! leave-client maintenance binary
//!
//! Syncs the schema, seeds demo data and inspects balances against the
//! configured SQLite database.

mod cli;

use anyhow::{Context, bail};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use leave_client::Database;
use leave_client::config::Config;
use leave_client::db::run_seeds;
use leave_client::models::{
    LeaveBalanceField, MembershipInclude, UserInclude, UserWhereUniqueInput,
};
use leave_client::orm::{FindManyArgs, FindUniqueArgs, OrderBy};

use crate::cli::{CliOptions, Command, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args()?;
    let mut config = Config::from_env()?;
    if let Some(url) = options.database_url {
        config.database_url = url;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if options.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    // `sync` reports its own result
    if options.command == Command::Sync {
        config.auto_sync_schema = false;
    }

    let db = Database::connect(&config).await?;
    info!("Database connected");

    let outcome = run(&db, options.command).await;
    db.disconnect().await;
    outcome
}

async fn run(db: &Database, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Sync => {
            let result = db.sync_schema().await;
            info!(
                tables_created = ?result.tables_created,
                columns_added = ?result.columns_added,
                "Schema sync finished"
            );
            if !result.is_clean() {
                for error in &result.errors {
                    warn!(error = %error, "Schema sync error");
                }
                bail!("Schema sync finished with {} error(s)", result.errors.len());
            }
        }
        Command::Seed => {
            let result = run_seeds(db).await;
            if !result.errors.is_empty() {
                bail!("Seeding failed: {}", result.errors.join("; "));
            }
            info!(tables = ?result.tables_seeded, "Seed finished");
        }
        Command::Balances { email } => {
            let balances =
                FindManyArgs::new().order_by(OrderBy::asc(LeaveBalanceField::LeaveType));
            let include = UserInclude::default().memberships(
                FindManyArgs::new().include(
                    MembershipInclude::default()
                        .company(Default::default())
                        .balances(balances),
                ),
            );
            let user = db
                .users()
                .find_unique(
                    FindUniqueArgs::new(UserWhereUniqueInput::Email(email.clone()))
                        .include(include),
                )
                .await?
                .with_context(|| format!("No user with email {}", email))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}
