//! Business workflows built on the client

pub mod leaves;

pub use leaves::{LeaveError, LeaveRequest, LeaveService};
