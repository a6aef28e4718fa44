//! leave-client - typed SQLite client for the leave-management schema
//!
//! One delegate per model (`users()`, `companies()`, `leaves()`, ...) with
//! the same operation set: `find_unique`, `find_first`, `find_many`,
//! `create`, `create_many`, `update`, `update_many`, `upsert`, `delete`,
//! `delete_many`, `aggregate`, `group_by` and `count`, plus interactive
//! transactions on [`db::Database`].

pub mod config;
pub mod error;
#[macro_use]
pub mod orm;
pub mod db;
pub mod models;
pub mod services;

pub use db::Database;
pub use error::{ClientError, Result};
