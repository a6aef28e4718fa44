//! Minimal CLI parsing for maintenance commands.

use anyhow::{Result, bail};

pub const USAGE: &str = "\
Usage: leave-client [--database-url <url>] <command>

Commands:
  sync               Create missing tables, columns and indexes
  seed               Insert the demo company, users and balances
  balances <email>   Print the leave balances of a user
  help               Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync,
    Seed,
    Balances { email: String },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub command: Command,
    pub database_url: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Result<Self> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut database_url = None;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => positional.insert(0, "help".to_string()),
                "--database-url" => match args.next() {
                    Some(value) => database_url = Some(value),
                    None => bail!("--database-url needs a value"),
                },
                _ if arg.starts_with("--database-url=") => {
                    database_url = arg.split_once('=').map(|(_, v)| v.to_string());
                }
                _ if arg.starts_with('-') => bail!("Unknown option: {}", arg),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("help") => Command::Help,
            Some("sync") => Command::Sync,
            Some("seed") => Command::Seed,
            Some("balances") => match positional.next() {
                Some(email) => Command::Balances { email },
                None => bail!("balances needs an email"),
            },
            Some(other) => bail!("Unknown command: {}", other),
        };

        Ok(Self {
            command,
            database_url,
        })
    }
}
