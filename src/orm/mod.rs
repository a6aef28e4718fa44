//! ORM layer
//!
//! Typed query surface for the models in `crate::models`:
//! - Filter inputs (`*WhereInput`, `*WhereUniqueInput`)
//! - Sort inputs (`OrderBy<Field>`)
//! - Create/update inputs and atomic number updates
//! - Aggregates and group-by
//! - Batched relation loading (`include`)
//! - SQL generation (parameterized via sqlx) and row decoding (`FromSqlRow`)
//!
//! Every model gets a [`Delegate`] exposing the same operation set:
//!
//! ```rust,ignore
//! use crate::models::{UserWhereUniqueInput, UserInclude};
//! use crate::orm::FindUniqueArgs;
//!
//! let user = db
//!     .users()
//!     .find_unique(
//!         FindUniqueArgs::new(UserWhereUniqueInput::Email("ada@example.com".into()))
//!             .include(UserInclude::default().memberships(FindManyArgs::new())),
//!     )
//!     .await?;
//! ```

#[macro_use]
mod macros;

mod aggregate;
mod args;
mod builder;
mod delegate;
mod executor;
mod filters;
pub mod relations;
mod traits;
pub mod transaction;
mod update;

pub use aggregate::*;
pub use args::*;
pub use builder::*;
pub use delegate::Delegate;
pub use executor::Executor;
pub use filters::*;
pub use traits::*;
pub use transaction::{IsolationLevel, TransactionOptions};
pub use update::*;
