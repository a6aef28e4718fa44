//! Enums shared by the models

use leave_macros::DbEnum;
use serde::{Deserialize, Serialize};

/// Kind of absence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Paid,
    Unpaid,
    /// Reduction du temps de travail
    Rtt,
    Sick,
    Maternity,
    Paternity,
    Parental,
    Bereavement,
    Marriage,
    Moving,
    ChildSick,
    Training,
    Unjustified,
    Adjustment,
}

impl LeaveType {
    /// Whether taking this leave consumes a [`LeaveBalance`](super::LeaveBalance)
    pub fn tracks_balance(self) -> bool {
        matches!(self, LeaveType::Paid | LeaveType::Rtt)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Canceled,
}

impl LeaveStatus {
    /// PENDING → APPROVED | REJECTED | CANCELED, APPROVED → CANCELED
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
                | (LeaveStatus::Pending, LeaveStatus::Canceled)
                | (LeaveStatus::Approved, LeaveStatus::Canceled)
        )
    }

    /// Pending and approved leaves block their dates
    pub fn is_active(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    Owner,
    Admin,
    Manager,
    #[default]
    Employee,
}

impl MembershipRole {
    pub fn can_review_leaves(self) -> bool {
        !matches!(self, MembershipRole::Employee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{DbEnum, SqlValue, ToSqlValue};

    #[test]
    fn test_labels() {
        assert_eq!(LeaveType::Rtt.as_str(), "RTT");
        assert_eq!(LeaveType::ChildSick.as_str(), "CHILD_SICK");
        assert_eq!(LeaveStatus::Canceled.to_string(), "CANCELED");
        assert_eq!(
            MembershipRole::Owner.to_sql_value(),
            SqlValue::String("OWNER".into())
        );
    }

    #[test]
    fn test_from_db_str() {
        assert_eq!(LeaveType::from_db_str("CHILD_SICK"), Some(LeaveType::ChildSick));
        assert_eq!(LeaveType::from_db_str("child_sick"), None);
        assert_eq!(LeaveType::VARIANTS.len(), 14);
    }

    #[test]
    fn test_serde_matches_db_labels() {
        for variant in LeaveType::VARIANTS {
            let json = serde_json::to_string(variant).unwrap();
            assert_eq!(json, format!("\"{}\"", variant.as_str()));
        }
    }

    #[test]
    fn test_status_transitions() {
        use LeaveStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Approved.can_transition_to(Canceled));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Canceled.can_transition_to(Pending));
    }

    #[test]
    fn test_tracked_types() {
        assert!(LeaveType::Paid.tracks_balance());
        assert!(LeaveType::Rtt.tracks_balance());
        assert!(!LeaveType::Sick.tracks_balance());
    }
}
