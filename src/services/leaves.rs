//! Leave request workflow
//!
//! Validates requests (date range, overlap, balance) and moves leaves
//! through their review states. Balance changes and status changes for
//! one leave are written in the same transaction.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::ClientError;
use crate::models::{
    Leave, LeaveBalance, LeaveBalanceCreateInput, LeaveBalanceUpdateInput, LeaveBalanceWhereInput,
    LeaveBalanceWhereUniqueInput, LeaveCreateInput, LeaveStatus, LeaveType, LeaveUpdateInput,
    LeaveWhereInput, LeaveWhereUniqueInput, Membership, MembershipWhereUniqueInput,
};
use crate::orm::{
    CountArgs, CreateArgs, DateTimeFilter, EnumFilter, FindUniqueArgs, FloatFilter, StringFilter,
    UpdateArgs, UpdateManyArgs, UpsertArgs,
};

#[derive(Debug, thiserror::Error)]
pub enum LeaveError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Invalid leave period: {0}")]
    InvalidRange(String),

    #[error("Leave overlaps {0} pending or approved leave(s)")]
    Overlap(i64),

    #[error("Insufficient {leave_type} balance: {requested} day(s) requested, {remaining} remaining")]
    InsufficientBalance {
        leave_type: LeaveType,
        requested: f64,
        remaining: f64,
    },

    #[error("A {from} leave cannot become {to}")]
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },

    #[error("User {0} may not review leaves of this company")]
    NotReviewer(String),

    #[error("Leave {0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, LeaveError>;

/// A new absence request
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub membership_id: String,
    pub leave_type: LeaveType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Worked days, at most the number of calendar days in the period
    pub days: f64,
    pub reason: Option<String>,
}

impl LeaveRequest {
    /// Inclusive number of calendar days covered
    pub fn calendar_days(&self) -> i64 {
        (self.end_date.date_naive() - self.start_date.date_naive()).num_days() + 1
    }

    fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(LeaveError::InvalidRange("start date is after end date".to_string()));
        }
        if self.days.is_nan() || self.days <= 0.0 {
            return Err(LeaveError::InvalidRange("days must be positive".to_string()));
        }
        let span = self.calendar_days();
        if self.days > span as f64 {
            return Err(LeaveError::InvalidRange(format!(
                "{} day(s) requested over a {} day period",
                self.days, span
            )));
        }
        Ok(())
    }
}

/// Pending and approved leaves of `membership_id` intersecting `[start, end]`
fn overlapping(membership_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> LeaveWhereInput {
    LeaveWhereInput {
        membership_id: Some(StringFilter::eq(membership_id)),
        status: Some(EnumFilter::in_list([
            LeaveStatus::Pending,
            LeaveStatus::Approved,
        ])),
        start_date: Some(DateTimeFilter::lte(end)),
        end_date: Some(DateTimeFilter::gte(start)),
        ..Default::default()
    }
}

async fn remaining_days(db: &Database, membership_id: &str, leave_type: LeaveType) -> Result<f64> {
    let balance = db
        .leave_balances()
        .find_unique(FindUniqueArgs::new(
            LeaveBalanceWhereUniqueInput::membership_type(membership_id, leave_type),
        ))
        .await?;
    Ok(balance.map_or(0.0, |b| b.remaining))
}

async fn find_leave(db: &Database, leave_id: &str) -> Result<Leave> {
    db.leaves()
        .find_unique(FindUniqueArgs::new(LeaveWhereUniqueInput::Id(
            leave_id.to_string(),
        )))
        .await?
        .ok_or_else(|| LeaveError::NotFound(leave_id.to_string()))
}

fn check_transition(leave: &Leave, to: LeaveStatus) -> Result<()> {
    if leave.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(LeaveError::InvalidTransition {
            from: leave.status,
            to,
        })
    }
}

/// The reviewer must hold a reviewing role in the leave's company
async fn check_reviewer(db: &Database, leave: &Leave, manager_id: &str) -> Result<()> {
    let membership: Membership = db
        .memberships()
        .find_unique_or_throw(FindUniqueArgs::new(MembershipWhereUniqueInput::Id(
            leave.membership_id.clone(),
        )))
        .await?;
    let reviewer = db
        .memberships()
        .find_unique(FindUniqueArgs::new(MembershipWhereUniqueInput::user_company(
            manager_id,
            &membership.company_id,
        )))
        .await?;
    match reviewer {
        Some(reviewer) if reviewer.role.can_review_leaves() => Ok(()),
        _ => Err(LeaveError::NotReviewer(manager_id.to_string())),
    }
}

/// Close a pending leave as approved or rejected
async fn review(
    db: Database,
    leave_id: String,
    manager_id: String,
    comment: Option<String>,
    to: LeaveStatus,
) -> Result<Leave> {
    let leave = find_leave(&db, &leave_id).await?;
    check_transition(&leave, to)?;
    check_reviewer(&db, &leave, &manager_id).await?;

    if to == LeaveStatus::Approved && leave.leave_type.tracks_balance() {
        // Conditional decrement: no row matches when the balance is short
        let filter = LeaveBalanceWhereInput {
            membership_id: Some(StringFilter::eq(&leave.membership_id)),
            leave_type: Some(EnumFilter::eq(leave.leave_type)),
            remaining: Some(FloatFilter::gte(leave.days)),
            ..Default::default()
        };
        let updated = db
            .leave_balances()
            .update_many(UpdateManyArgs::new(
                filter,
                LeaveBalanceUpdateInput::decrement(leave.days),
            ))
            .await?;
        if updated.count == 0 {
            return Err(LeaveError::InsufficientBalance {
                leave_type: leave.leave_type,
                requested: leave.days,
                remaining: remaining_days(&db, &leave.membership_id, leave.leave_type).await?,
            });
        }
    }

    let reviewed = db
        .leaves()
        .update(UpdateArgs::new(
            LeaveWhereUniqueInput::Id(leave_id),
            LeaveUpdateInput {
                status: Some(to),
                manager_id: Some(Some(manager_id)),
                manager_comment: Some(comment),
                reviewed_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        ))
        .await?;
    Ok(reviewed)
}

/// Requests, reviews and balance adjustments for leaves
#[derive(Debug, Clone)]
pub struct LeaveService {
    db: Database,
}

impl LeaveService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// File a new PENDING leave
    pub async fn request(&self, request: LeaveRequest) -> Result<Leave> {
        request.validate()?;

        let leave = self
            .db
            .transaction(|tx| async move {
                let clashes = tx
                    .leaves()
                    .count(CountArgs::new(overlapping(
                        &request.membership_id,
                        request.start_date,
                        request.end_date,
                    )))
                    .await?;
                if clashes > 0 {
                    return Err(LeaveError::Overlap(clashes));
                }

                if request.leave_type.tracks_balance() {
                    let remaining =
                        remaining_days(&tx, &request.membership_id, request.leave_type).await?;
                    if remaining < request.days {
                        return Err(LeaveError::InsufficientBalance {
                            leave_type: request.leave_type,
                            requested: request.days,
                            remaining,
                        });
                    }
                }

                let mut data = LeaveCreateInput::new(
                    request.membership_id,
                    request.leave_type,
                    request.start_date,
                    request.end_date,
                    request.days,
                );
                data.reason = request.reason;
                Ok::<_, LeaveError>(tx.leaves().create(CreateArgs::new(data)).await?)
            })
            .await?;

        info!(
            leave_id = %leave.id,
            membership_id = %leave.membership_id,
            leave_type = %leave.leave_type,
            days = leave.days,
            "Leave requested"
        );
        Ok(leave)
    }

    /// Approve a pending leave, consuming the balance for tracked types
    pub async fn approve(
        &self,
        leave_id: &str,
        manager_id: &str,
        comment: Option<String>,
    ) -> Result<Leave> {
        let (leave_id, manager_id) = (leave_id.to_string(), manager_id.to_string());
        let leave = self
            .db
            .transaction(|tx| review(tx, leave_id, manager_id, comment, LeaveStatus::Approved))
            .await?;
        info!(leave_id = %leave.id, manager_id = ?leave.manager_id, "Leave approved");
        Ok(leave)
    }

    pub async fn reject(
        &self,
        leave_id: &str,
        manager_id: &str,
        comment: Option<String>,
    ) -> Result<Leave> {
        let (leave_id, manager_id) = (leave_id.to_string(), manager_id.to_string());
        let leave = self
            .db
            .transaction(|tx| review(tx, leave_id, manager_id, comment, LeaveStatus::Rejected))
            .await?;
        info!(leave_id = %leave.id, manager_id = ?leave.manager_id, "Leave rejected");
        Ok(leave)
    }

    /// Cancel a pending or approved leave. Cancelling an approved leave
    /// gives its days back.
    pub async fn cancel(&self, leave_id: &str) -> Result<Leave> {
        let leave_id = leave_id.to_string();
        let leave = self
            .db
            .transaction(|tx| async move {
                let leave = find_leave(&tx, &leave_id).await?;
                check_transition(&leave, LeaveStatus::Canceled)?;

                if leave.status == LeaveStatus::Approved && leave.leave_type.tracks_balance() {
                    restore(&tx, &leave).await?;
                }

                Ok::<_, LeaveError>(
                    tx.leaves()
                        .update(UpdateArgs::new(
                            LeaveWhereUniqueInput::Id(leave_id),
                            LeaveUpdateInput {
                                status: Some(LeaveStatus::Canceled),
                                ..Default::default()
                            },
                        ))
                        .await?,
                )
            })
            .await?;
        info!(leave_id = %leave.id, "Leave canceled");
        Ok(leave)
    }

    /// Add `delta` days (negative to remove) to a balance, creating it if needed
    pub async fn adjust_balance(
        &self,
        membership_id: &str,
        leave_type: LeaveType,
        delta: f64,
    ) -> Result<LeaveBalance> {
        let balance = adjust(&self.db, membership_id, leave_type, delta).await?;
        info!(
            membership_id,
            leave_type = %leave_type,
            delta,
            remaining = balance.remaining,
            "Leave balance adjusted"
        );
        Ok(balance)
    }
}

async fn adjust(
    db: &Database,
    membership_id: &str,
    leave_type: LeaveType,
    delta: f64,
) -> Result<LeaveBalance> {
    Ok(db
        .leave_balances()
        .upsert(UpsertArgs::new(
            LeaveBalanceWhereUniqueInput::membership_type(membership_id, leave_type),
            LeaveBalanceCreateInput::new(membership_id, leave_type).remaining(delta),
            LeaveBalanceUpdateInput::increment(delta),
        ))
        .await?)
}

async fn restore(db: &Database, leave: &Leave) -> Result<()> {
    let balance = adjust(db, &leave.membership_id, leave.leave_type, leave.days).await?;
    debug!(
        leave_id = %leave.id,
        remaining = balance.remaining,
        "Balance restored"
    );
    Ok(())
}
