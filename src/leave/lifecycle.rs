//! The request state machine: create, approve/reject, update, delete.
//! Every operation that touches both a request row and a balance row runs
//! inside one transaction; a failure partway rolls both back.

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

use crate::error::ApiError;
use crate::leave::{eligibility, eligibility::ValidationContext, ledger, policy, policy::Actor};
use crate::model::{
    leave_balance::LeaveBalance,
    leave_request::{LeaveRequest, LeaveStatus},
    leave_type::LeaveType,
    team::Team,
    user::User,
};

const REQUEST_COLUMNS: &str = "id, user_id, leave_type_id, start_date, end_date, total_days, \
     reason, document, status, approved_by, approved_at, rejection_reason, created_at";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug)]
pub struct CreateLeaveInput {
    /// Manager/admin on-behalf target; defaults to the actor.
    pub target_user_id: Option<u64>,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Default)]
pub struct UpdateLeaveInput {
    pub leave_type_id: Option<u64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `None` keeps the stored value, `Some(None)` clears it.
    pub reason: Option<Option<String>>,
    pub document: Option<Option<String>>,
}

/// One reservation change a reschedule applies to a (type, year) balance.
#[derive(Debug)]
struct ReservationMove<'a> {
    leave_type: &'a LeaveType,
    year: i32,
    days: i32,
}

/// The release/reserve pair for a reschedule. A type without balance
/// tracking contributes no move; a same-type same-year reschedule still
/// releases and re-reserves, so pending days always equal the stored total.
fn rebooking_moves<'a>(
    old_type: &'a LeaveType,
    old_year: i32,
    old_days: i32,
    new_type: &'a LeaveType,
    new_year: i32,
    new_days: i32,
) -> (Option<ReservationMove<'a>>, Option<ReservationMove<'a>>) {
    let release = old_type.has_balance.then(|| ReservationMove {
        leave_type: old_type,
        year: old_year,
        days: old_days,
    });
    let reserve = new_type.has_balance.then(|| ReservationMove {
        leave_type: new_type,
        year: new_year,
        days: new_days,
    });
    (release, reserve)
}

/// When a reschedule is validated against the same (type, year) balance the
/// request already holds days in, its own reservation must not count
/// against it.
fn discount_own_reservation(
    balance: &mut LeaveBalance,
    request: &LeaveRequest,
    new_type_id: u64,
    new_year: i32,
) {
    if new_type_id == request.leave_type_id && new_year == request.start_date.year() {
        balance.release(request.total_days);
    }
}

/// Submit a new request: validate, persist as pending, reserve balance.
pub async fn create(
    pool: &MySqlPool,
    actor: &Actor,
    input: CreateLeaveInput,
) -> Result<LeaveRequest, ApiError> {
    let mut tx = pool.begin().await?;

    let target_id = input.target_user_id.unwrap_or(actor.user_id);
    let target = fetch_user(&mut tx, target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    if !policy::can_create_for(actor, &target) {
        return Err(ApiError::forbidden(
            "You can only create leave requests for members of your team.",
        ));
    }

    let leave_type = fetch_leave_type(&mut tx, input.leave_type_id)
        .await?
        .ok_or_else(|| {
            ApiError::validation("leave_type_id", "The selected leave type does not exist.")
        })?;

    let year = input.start_date.year();
    let balance = if leave_type.has_balance {
        fetch_balance(&mut tx, target.id, leave_type.id, year).await?
    } else {
        None
    };
    let approved = fetch_approved_ranges(&mut tx, target.id).await?;

    let total_days = eligibility::validate(&ValidationContext {
        target: &target,
        leave_type: &leave_type,
        today: Utc::now().date_naive(),
        start_date: input.start_date,
        end_date: input.end_date,
        document: input.document.as_deref(),
        balance: balance.as_ref(),
        approved: &approved,
    })
    .map_err(ApiError::Validation)?;

    let result = sqlx::query(
        "INSERT INTO leave_requests \
         (user_id, leave_type_id, start_date, end_date, total_days, reason, document, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'pending')",
    )
    .bind(target.id)
    .bind(leave_type.id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(total_days)
    .bind(&input.reason)
    .bind(&input.document)
    .execute(&mut *tx)
    .await?;
    let request_id = result.last_insert_id();

    if leave_type.has_balance {
        ledger::reserve(&mut tx, target.id, &leave_type, year, total_days).await?;
    }

    let request = fetch_request(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    tx.commit().await?;

    info!(request_id, user_id = target.id, total_days, "Leave request submitted");
    Ok(request)
}

/// Approve or reject a pending request. The status-guarded UPDATE
/// serializes concurrent decisions: only one transition can win.
pub async fn decide(
    pool: &MySqlPool,
    actor: &Actor,
    request_id: u64,
    decision: Decision,
    rejection_reason: Option<String>,
) -> Result<LeaveRequest, ApiError> {
    let mut tx = pool.begin().await?;

    let request = fetch_request_for_update(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    let owner = fetch_user(&mut tx, request.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let team = match owner.team_id {
        Some(team_id) => fetch_team(&mut tx, team_id).await?,
        None => None,
    };
    if !policy::can_decide(actor, &owner, team.as_ref()) {
        return Err(ApiError::forbidden(
            "Only an admin or the team's designated manager may decide this request.",
        ));
    }

    if decision == Decision::Reject
        && rejection_reason.as_deref().map_or(true, |r| r.trim().is_empty())
    {
        return Err(ApiError::validation(
            "rejection_reason",
            "A rejection reason is required when rejecting a request.",
        ));
    }

    ensure_pending(&request)?;

    let result = sqlx::query(
        "UPDATE leave_requests \
         SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(decision.status())
    .bind(actor.user_id)
    .bind(Utc::now())
    .bind(&rejection_reason)
    .bind(request_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::state("Leave request was already processed."));
    }

    let leave_type = fetch_leave_type(&mut tx, request.leave_type_id)
        .await?
        .ok_or(ApiError::NotFound("leave type"))?;
    if leave_type.has_balance {
        let year = request.start_date.year();
        match decision {
            Decision::Approve => {
                ledger::commit(&mut tx, owner.id, &leave_type, year, request.total_days).await?
            }
            Decision::Reject => {
                ledger::release(&mut tx, owner.id, &leave_type, year, request.total_days).await?
            }
        }
    }

    let updated = fetch_request(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    tx.commit().await?;

    info!(
        request_id,
        approver = actor.user_id,
        status = %updated.status,
        "Leave request decided"
    );
    Ok(updated)
}

/// Edit a pending request. When the dates or the leave type change, the old
/// reservation is released and the new one reserved in the same transaction,
/// so pending days always match the stored total.
pub async fn update(
    pool: &MySqlPool,
    actor: &Actor,
    request_id: u64,
    patch: UpdateLeaveInput,
) -> Result<LeaveRequest, ApiError> {
    let mut tx = pool.begin().await?;

    let request = fetch_request_for_update(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    if !policy::can_modify_request(actor, request.user_id) {
        return Err(ApiError::forbidden(
            "Only the requester or an admin may update this request.",
        ));
    }
    ensure_pending(&request)?;

    let target = fetch_user(&mut tx, request.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let old_type = fetch_leave_type(&mut tx, request.leave_type_id)
        .await?
        .ok_or(ApiError::NotFound("leave type"))?;

    let type_changed = patch
        .leave_type_id
        .is_some_and(|id| id != request.leave_type_id);
    let new_type = if type_changed {
        fetch_leave_type(&mut tx, patch.leave_type_id.unwrap_or(request.leave_type_id))
            .await?
            .ok_or_else(|| {
                ApiError::validation("leave_type_id", "The selected leave type does not exist.")
            })?
    } else {
        old_type.clone()
    };

    let start_date = patch.start_date.unwrap_or(request.start_date);
    let end_date = patch.end_date.unwrap_or(request.end_date);
    let reason = patch.reason.unwrap_or_else(|| request.reason.clone());
    let document = patch.document.unwrap_or_else(|| request.document.clone());

    let reschedule =
        type_changed || start_date != request.start_date || end_date != request.end_date;

    let total_days = if reschedule {
        let year = start_date.year();
        let mut balance = if new_type.has_balance {
            fetch_balance(&mut tx, target.id, new_type.id, year).await?
        } else {
            None
        };
        if let Some(b) = balance.as_mut() {
            discount_own_reservation(b, &request, new_type.id, year);
        }
        let approved = fetch_approved_ranges(&mut tx, target.id).await?;

        let total_days = eligibility::validate(&ValidationContext {
            target: &target,
            leave_type: &new_type,
            today: Utc::now().date_naive(),
            start_date,
            end_date,
            document: document.as_deref(),
            balance: balance.as_ref(),
            approved: &approved,
        })
        .map_err(ApiError::Validation)?;

        let (release, reserve) = rebooking_moves(
            &old_type,
            request.start_date.year(),
            request.total_days,
            &new_type,
            year,
            total_days,
        );
        if let Some(m) = release {
            ledger::release(&mut tx, target.id, m.leave_type, m.year, m.days).await?;
        }
        if let Some(m) = reserve {
            ledger::reserve(&mut tx, target.id, m.leave_type, m.year, m.days).await?;
        }
        total_days
    } else {
        request.total_days
    };

    sqlx::query(
        "UPDATE leave_requests \
         SET leave_type_id = ?, start_date = ?, end_date = ?, total_days = ?, \
             reason = ?, document = ? \
         WHERE id = ?",
    )
    .bind(new_type.id)
    .bind(start_date)
    .bind(end_date)
    .bind(total_days)
    .bind(&reason)
    .bind(&document)
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch_request(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    tx.commit().await?;

    info!(request_id, rescheduled = reschedule, "Leave request updated");
    Ok(updated)
}

/// Remove a pending request and return its reservation.
pub async fn delete(pool: &MySqlPool, actor: &Actor, request_id: u64) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let request = fetch_request_for_update(&mut tx, request_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    if !policy::can_modify_request(actor, request.user_id) {
        return Err(ApiError::forbidden(
            "Only the requester or an admin may delete this request.",
        ));
    }
    ensure_pending(&request)?;

    let leave_type = fetch_leave_type(&mut tx, request.leave_type_id)
        .await?
        .ok_or(ApiError::NotFound("leave type"))?;
    if leave_type.has_balance {
        ledger::release(
            &mut tx,
            request.user_id,
            &leave_type,
            request.start_date.year(),
            request.total_days,
        )
        .await?;
    }

    sqlx::query("DELETE FROM leave_requests WHERE id = ?")
        .bind(request_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(request_id, "Leave request deleted");
    Ok(())
}

/// Approved and rejected requests are immutable regardless of actor.
fn ensure_pending(request: &LeaveRequest) -> Result<(), ApiError> {
    if request.is_pending() {
        Ok(())
    } else {
        Err(ApiError::state(format!(
            "Leave request is already {}.",
            request.status
        )))
    }
}

// ---- fetch helpers (shared with the API layer) ----

pub async fn fetch_user(
    conn: &mut MySqlConnection,
    user_id: u64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password, role, team_id FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_team(
    conn: &mut MySqlConnection,
    team_id: u64,
) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        "SELECT id, name, manager_id, description, is_active FROM teams WHERE id = ?",
    )
    .bind(team_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_leave_type(
    conn: &mut MySqlConnection,
    leave_type_id: u64,
) -> Result<Option<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>(
        "SELECT id, name, slug, description, is_paid, max_days_per_year, \
                requires_medical_document, has_balance, visible_to_employees, is_active, color \
         FROM leave_types WHERE id = ?",
    )
    .bind(leave_type_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_request(
    conn: &mut MySqlConnection,
    request_id: u64,
) -> Result<Option<LeaveRequest>, sqlx::Error> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(request_id)
        .fetch_optional(conn)
        .await
}

async fn fetch_request_for_update(
    conn: &mut MySqlConnection,
    request_id: u64,
) -> Result<Option<LeaveRequest>, sqlx::Error> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(request_id)
        .fetch_optional(conn)
        .await
}

async fn fetch_balance(
    conn: &mut MySqlConnection,
    user_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<Option<LeaveBalance>, sqlx::Error> {
    sqlx::query_as::<_, LeaveBalance>(
        "SELECT id, user_id, leave_type_id, year, total_days, used_days, pending_days \
         FROM leave_balances WHERE user_id = ? AND leave_type_id = ? AND year = ?",
    )
    .bind(user_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(conn)
    .await
}

async fn fetch_approved_ranges(
    conn: &mut MySqlConnection,
    user_id: u64,
) -> Result<Vec<(NaiveDate, NaiveDate)>, sqlx::Error> {
    sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        "SELECT start_date, end_date FROM leave_requests \
         WHERE user_id = ? AND status = 'approved'",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 42,
            user_id: 7,
            leave_type_id: 3,
            start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            total_days: 3,
            reason: None,
            document: None,
            status,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: None,
        }
    }

    #[test]
    fn terminal_requests_are_immutable() {
        assert!(ensure_pending(&request(LeaveStatus::Pending)).is_ok());

        let err = ensure_pending(&request(LeaveStatus::Approved)).unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
        assert!(err.to_string().contains("approved"));

        let err = ensure_pending(&request(LeaveStatus::Rejected)).unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[test]
    fn decisions_map_to_terminal_states() {
        assert_eq!(Decision::Approve.status(), LeaveStatus::Approved);
        assert_eq!(Decision::Reject.status(), LeaveStatus::Rejected);
    }

    fn leave_type(id: u64, has_balance: bool) -> LeaveType {
        LeaveType {
            id,
            name: format!("type-{id}"),
            slug: format!("type-{id}"),
            description: None,
            is_paid: true,
            max_days_per_year: Some(30),
            requires_medical_document: false,
            has_balance,
            visible_to_employees: true,
            is_active: true,
            color: "#1677FF".into(),
        }
    }

    fn balance(pending: i32) -> LeaveBalance {
        LeaveBalance {
            id: 11,
            user_id: 7,
            leave_type_id: 3,
            year: 2026,
            total_days: 30,
            used_days: 0,
            pending_days: pending,
        }
    }

    #[test]
    fn reschedule_releases_the_old_days_and_reserves_the_new() {
        let sick = leave_type(3, true);
        let (release, reserve) = rebooking_moves(&sick, 2026, 3, &sick, 2026, 5);

        let release = release.unwrap();
        assert_eq!((release.leave_type.id, release.year, release.days), (3, 2026, 3));

        let reserve = reserve.unwrap();
        assert_eq!((reserve.leave_type.id, reserve.year, reserve.days), (3, 2026, 5));
    }

    #[test]
    fn cross_year_reschedule_touches_both_years() {
        let sick = leave_type(3, true);
        let (release, reserve) = rebooking_moves(&sick, 2026, 3, &sick, 2027, 3);

        assert_eq!(release.unwrap().year, 2026);
        assert_eq!(reserve.unwrap().year, 2027);
    }

    #[test]
    fn type_change_moves_the_reservation_between_types() {
        let sick = leave_type(3, true);
        let vacation = leave_type(4, true);
        let (release, reserve) = rebooking_moves(&sick, 2026, 3, &vacation, 2026, 3);

        assert_eq!(release.unwrap().leave_type.id, 3);
        assert_eq!(reserve.unwrap().leave_type.id, 4);
    }

    #[test]
    fn untracked_types_produce_no_moves() {
        let sick = leave_type(3, true);
        let unpaid = leave_type(9, false);

        let (release, reserve) = rebooking_moves(&unpaid, 2026, 3, &sick, 2026, 3);
        assert!(release.is_none());
        assert!(reserve.unwrap().leave_type.id == 3);

        let (release, reserve) = rebooking_moves(&sick, 2026, 3, &unpaid, 2026, 3);
        assert_eq!(release.unwrap().leave_type.id, 3);
        assert!(reserve.is_none());
    }

    #[test]
    fn own_reservation_is_discounted_for_the_same_type_and_year() {
        // The stored request: type 3, starting 2026, 3 days (see `request`).
        let req = request(LeaveStatus::Pending);

        let mut b = balance(5);
        discount_own_reservation(&mut b, &req, 3, 2026);
        assert_eq!(b.pending_days, 2);
    }

    #[test]
    fn discount_does_not_apply_across_types_or_years() {
        let req = request(LeaveStatus::Pending);

        let mut b = balance(5);
        discount_own_reservation(&mut b, &req, 4, 2026);
        assert_eq!(b.pending_days, 5);

        discount_own_reservation(&mut b, &req, 3, 2027);
        assert_eq!(b.pending_days, 5);
    }
}
