use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per (user, leave type, calendar year). Counters are mutated only
/// through the ledger; the arithmetic lives here so it can be tested without
/// a database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 11,
        "user_id": 7,
        "leave_type_id": 3,
        "year": 2026,
        "total_days": 30,
        "used_days": 3,
        "pending_days": 2
    })
)]
pub struct LeaveBalance {
    #[schema(example = 11)]
    pub id: u64,

    #[schema(example = 7)]
    pub user_id: u64,

    #[schema(example = 3)]
    pub leave_type_id: u64,

    #[schema(example = 2026)]
    pub year: i32,

    #[schema(example = 30)]
    pub total_days: i32,

    #[schema(example = 3)]
    pub used_days: i32,

    #[schema(example = 2)]
    pub pending_days: i32,
}

impl LeaveBalance {
    /// `max(0, total - used - pending)`. Admin overrides may push the raw
    /// difference negative; the computed value never is.
    pub fn available_days(&self) -> i32 {
        (self.total_days - self.used_days - self.pending_days).max(0)
    }

    /// Reserve days for a newly submitted (pending) request.
    pub fn reserve(&mut self, days: i32) {
        self.pending_days += days;
    }

    /// Return reserved days on rejection or deletion. The stored counter is
    /// floored at zero; callers detect and log the discrepancy.
    pub fn release(&mut self, days: i32) {
        self.pending_days = (self.pending_days - days).max(0);
    }

    /// Move reserved days into consumed days on approval.
    pub fn commit(&mut self, days: i32) {
        self.pending_days = (self.pending_days - days).max(0);
        self.used_days += days;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(total: i32, used: i32, pending: i32) -> LeaveBalance {
        LeaveBalance {
            id: 1,
            user_id: 7,
            leave_type_id: 3,
            year: 2026,
            total_days: total,
            used_days: used,
            pending_days: pending,
        }
    }

    #[test]
    fn available_days_floors_at_zero() {
        assert_eq!(balance(30, 3, 2).available_days(), 25);
        assert_eq!(balance(5, 4, 4).available_days(), 0);
        // Admin lowered the allocation below current usage.
        assert_eq!(balance(0, 10, 0).available_days(), 0);
    }

    #[test]
    fn reserve_then_commit_moves_days_into_used() {
        let mut b = balance(30, 0, 0);
        b.reserve(3);
        assert_eq!(b.pending_days, 3);
        assert_eq!(b.available_days(), 27);

        b.commit(3);
        assert_eq!(b.used_days, 3);
        assert_eq!(b.pending_days, 0);
        assert_eq!(b.available_days(), 27);
    }

    #[test]
    fn reserve_then_release_restores_pending() {
        let mut b = balance(30, 5, 2);
        b.reserve(4);
        b.release(4);
        assert_eq!(b.pending_days, 2);
        assert_eq!(b.used_days, 5);
    }

    #[test]
    fn release_never_drives_pending_negative() {
        let mut b = balance(30, 0, 1);
        b.release(5);
        assert_eq!(b.pending_days, 0);
    }
}
