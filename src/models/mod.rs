//! Models of the leave-management schema
//!
//! Each module holds the record struct, its field enum, the typed
//! `*WhereInput`/`*CreateInput`/`*UpdateInput`/`*Include` inputs and the
//! [`Model`](crate::orm::Model) impl that ties them to a table.

mod account;
mod company;
mod enums;
mod leave;
mod leave_balance;
mod membership;
mod session;
mod user;
mod verification;

pub use account::*;
pub use company::*;
pub use enums::*;
pub use leave::*;
pub use leave_balance::*;
pub use membership::*;
pub use session::*;
pub use user::*;
pub use verification::*;
