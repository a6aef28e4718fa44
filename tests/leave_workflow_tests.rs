//! Integration tests for the leave request / review workflow

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use common::{Team, create_balance, create_company, create_membership, create_team, day, test_db};
use leave_client::Database;
use leave_client::models::{
    LeaveBalanceWhereUniqueInput, LeaveStatus, LeaveType, LeaveWhereUniqueInput, MembershipRole,
};
use leave_client::orm::FindUniqueArgs;
use leave_client::services::{LeaveError, LeaveRequest, LeaveService};

fn request(team: &Team, leave_type: LeaveType, start: u32, end: u32, days: f64) -> LeaveRequest {
    LeaveRequest {
        membership_id: team.employee_membership.id.clone(),
        leave_type,
        start_date: day(2025, 9, start),
        end_date: day(2025, 9, end),
        days,
        reason: None,
    }
}

async fn remaining(db: &Database, team: &Team, leave_type: LeaveType) -> Option<f64> {
    db.leave_balances()
        .find_unique(FindUniqueArgs::new(LeaveBalanceWhereUniqueInput::membership_type(
            &team.employee_membership.id,
            leave_type,
        )))
        .await
        .unwrap()
        .map(|b| b.remaining)
}

async fn setup() -> (common::TestDb, Team, LeaveService) {
    let db = test_db().await;
    let team = create_team(&db).await;
    create_balance(&db, &team.employee_membership, LeaveType::Paid, 10.0).await;
    let service = LeaveService::new(db.db.clone());
    (db, team, service)
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_request_creates_pending_leave() {
    let (db, team, service) = setup().await;

    let mut new_leave = request(&team, LeaveType::Paid, 1, 3, 3.0);
    new_leave.reason = Some("Holidays".into());
    let leave = service.request(new_leave).await.unwrap();

    assert_eq!(leave.status, LeaveStatus::Pending);
    assert_eq!(leave.days, 3.0);
    assert_eq!(leave.reason.as_deref(), Some("Holidays"));
    assert_eq!(leave.manager_id, None);
    // Nothing is consumed until approval
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(10.0));
}

#[tokio::test]
async fn test_request_rejects_bad_periods() {
    let (_db, team, service) = setup().await;

    let backwards = service.request(request(&team, LeaveType::Paid, 5, 3, 1.0)).await;
    assert_matches!(backwards, Err(LeaveError::InvalidRange(_)));

    let too_many = service.request(request(&team, LeaveType::Paid, 1, 2, 3.0)).await;
    assert_matches!(too_many, Err(LeaveError::InvalidRange(_)));

    let zero = service.request(request(&team, LeaveType::Paid, 1, 2, 0.0)).await;
    assert_matches!(zero, Err(LeaveError::InvalidRange(_)));
}

#[tokio::test]
async fn test_request_rejects_overlap_with_active_leaves() {
    let (_db, team, service) = setup().await;
    service
        .request(request(&team, LeaveType::Paid, 10, 12, 3.0))
        .await
        .unwrap();

    let clash = service
        .request(request(&team, LeaveType::Sick, 12, 14, 1.0))
        .await;
    assert_matches!(clash, Err(LeaveError::Overlap(1)));

    // Adjacent periods do not overlap
    service
        .request(request(&team, LeaveType::Sick, 13, 14, 2.0))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_leave_frees_its_dates() {
    let (_db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Paid, 10, 12, 3.0))
        .await
        .unwrap();
    service
        .reject(&leave.id, &team.manager.id, Some("Busy week".into()))
        .await
        .unwrap();

    service
        .request(request(&team, LeaveType::Paid, 11, 11, 1.0))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_request_checks_tracked_balance() {
    let (_db, team, service) = setup().await;

    let err = service
        .request(request(&team, LeaveType::Paid, 1, 20, 12.0))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LeaveError::InsufficientBalance {
            leave_type: LeaveType::Paid,
            requested,
            remaining
        } if requested == 12.0 && remaining == 10.0
    );

    // No RTT balance at all
    let err = service
        .request(request(&team, LeaveType::Rtt, 1, 1, 1.0))
        .await
        .unwrap_err();
    assert_matches!(err, LeaveError::InsufficientBalance { remaining, .. } if remaining == 0.0);

    // Untracked types need no balance
    service
        .request(request(&team, LeaveType::Sick, 1, 1, 1.0))
        .await
        .unwrap();
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn test_approve_consumes_balance() {
    let (db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Paid, 1, 4, 4.0))
        .await
        .unwrap();

    let approved = service
        .approve(&leave.id, &team.manager.id, Some("Enjoy".into()))
        .await
        .unwrap();

    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(approved.manager_id.as_deref(), Some(team.manager.id.as_str()));
    assert_eq!(approved.manager_comment.as_deref(), Some("Enjoy"));
    assert!(approved.reviewed_at.is_some());
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(6.0));

    let again = service.approve(&leave.id, &team.manager.id, None).await;
    assert_matches!(
        again,
        Err(LeaveError::InvalidTransition {
            from: LeaveStatus::Approved,
            to: LeaveStatus::Approved
        })
    );
}

#[tokio::test]
async fn test_approve_fails_when_balance_shrank() {
    let (db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Paid, 1, 5, 5.0))
        .await
        .unwrap();
    service
        .adjust_balance(&team.employee_membership.id, LeaveType::Paid, -8.0)
        .await
        .unwrap();

    let err = service
        .approve(&leave.id, &team.manager.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, LeaveError::InsufficientBalance { remaining, .. } if remaining == 2.0);

    let unchanged = db
        .leaves()
        .find_unique_or_throw(FindUniqueArgs::new(LeaveWhereUniqueInput::Id(leave.id)))
        .await
        .unwrap();
    assert_eq!(unchanged.status, LeaveStatus::Pending);
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(2.0));
}

#[tokio::test]
async fn test_only_reviewers_of_the_company_may_review() {
    let (db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Sick, 1, 1, 1.0))
        .await
        .unwrap();

    let own = service.approve(&leave.id, &team.employee.id, None).await;
    assert_matches!(own, Err(LeaveError::NotReviewer(id)) if id == team.employee.id);

    // A manager elsewhere is not a reviewer here
    let other = create_company(&db, "Beta", "beta").await;
    let outsider = common::create_user(&db, "Olga", "olga@beta.test").await;
    create_membership(&db, &outsider, &other, MembershipRole::Owner).await;
    let foreign = service.reject(&leave.id, &outsider.id, None).await;
    assert_matches!(foreign, Err(LeaveError::NotReviewer(_)));

    let missing = service.approve("nope", &team.manager.id, None).await;
    assert_matches!(missing, Err(LeaveError::NotFound(id)) if id == "nope");
}

// ============================================================================
// Cancellation and adjustments
// ============================================================================

#[tokio::test]
async fn test_cancel_approved_leave_restores_balance() {
    let (db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Paid, 1, 2, 2.0))
        .await
        .unwrap();
    service
        .approve(&leave.id, &team.manager.id, None)
        .await
        .unwrap();
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(8.0));

    let canceled = service.cancel(&leave.id).await.unwrap();
    assert_eq!(canceled.status, LeaveStatus::Canceled);
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(10.0));

    let twice = service.cancel(&leave.id).await;
    assert_matches!(twice, Err(LeaveError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_cancel_pending_leave_leaves_balance_alone() {
    let (db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Paid, 1, 2, 2.0))
        .await
        .unwrap();

    service.cancel(&leave.id).await.unwrap();
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(10.0));
}

#[tokio::test]
async fn test_rejected_leave_cannot_be_canceled() {
    let (_db, team, service) = setup().await;
    let leave = service
        .request(request(&team, LeaveType::Sick, 1, 1, 1.0))
        .await
        .unwrap();
    service
        .reject(&leave.id, &team.manager.id, None)
        .await
        .unwrap();

    let err = service.cancel(&leave.id).await.unwrap_err();
    assert_matches!(
        err,
        LeaveError::InvalidTransition {
            from: LeaveStatus::Rejected,
            to: LeaveStatus::Canceled
        }
    );
}

#[tokio::test]
async fn test_adjust_balance_creates_missing_balance() {
    let (db, team, service) = setup().await;

    let rtt = service
        .adjust_balance(&team.employee_membership.id, LeaveType::Rtt, 1.5)
        .await
        .unwrap();
    assert_eq!(rtt.remaining, 1.5);

    let paid = service
        .adjust_balance(&team.employee_membership.id, LeaveType::Paid, 2.5)
        .await
        .unwrap();
    assert_eq!(paid.remaining, 12.5);
    assert_eq!(remaining(&db, &team, LeaveType::Rtt).await, Some(1.5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adjustments_are_serialized() {
    let (db, team, service) = setup().await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            let membership_id = team.employee_membership.id.clone();
            tokio::spawn(async move {
                service
                    .adjust_balance(&membership_id, LeaveType::Paid, 1.0)
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(remaining(&db, &team, LeaveType::Paid).await, Some(30.0));
}
