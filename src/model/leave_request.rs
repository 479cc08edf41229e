use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Request state machine: `pending` is the sole initial state and the only
/// one in which a request may be edited or deleted; `approved` and
/// `rejected` are terminal.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "user_id": 7,
        "leave_type_id": 3,
        "start_date": "2026-02-01",
        "end_date": "2026-02-03",
        "total_days": 3,
        "reason": "Flu",
        "document": "leave-documents/42.pdf",
        "status": "pending",
        "approved_by": null,
        "approved_at": null,
        "rejection_reason": null,
        "created_at": "2026-01-20T09:30:00Z"
    })
)]
pub struct LeaveRequest {
    #[schema(example = 42)]
    pub id: u64,

    #[schema(example = 7)]
    pub user_id: u64,

    #[schema(example = 3)]
    pub leave_type_id: u64,

    #[schema(example = "2026-02-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,

    #[schema(example = "2026-02-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,

    /// Always recomputed from the dates, never trusted from input.
    #[schema(example = 3)]
    pub total_days: i32,

    #[schema(nullable = true)]
    pub reason: Option<String>,

    /// Opaque path into the external blob store.
    #[schema(nullable = true)]
    pub document: Option<String>,

    #[schema(example = "pending")]
    pub status: LeaveStatus,

    #[schema(example = 4, nullable = true)]
    pub approved_by: Option<u64>,

    #[schema(format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,

    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,

    #[schema(example = "2026-01-20T09:30:00Z", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveRequest {
    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

/// Inclusive day count: start and end both count.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> i32 {
    (end - start).num_days() as i32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_count_is_inclusive() {
        assert_eq!(day_count(date(2026, 3, 10), date(2026, 3, 12)), 3);
        assert_eq!(day_count(date(2026, 3, 10), date(2026, 3, 10)), 1);
    }

    #[test]
    fn day_count_spans_month_boundaries() {
        assert_eq!(day_count(date(2026, 1, 30), date(2026, 2, 2)), 4);
        // 2028 is a leap year.
        assert_eq!(day_count(date(2028, 2, 28), date(2028, 3, 1)), 3);
    }

    #[test]
    fn status_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!(LeaveStatus::from_str("approved").unwrap(), LeaveStatus::Approved);
        assert_eq!(LeaveStatus::Pending.to_string(), "pending");
        assert!(LeaveStatus::from_str("cancelled").is_err());
    }
}
