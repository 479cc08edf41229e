use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A category of leave. Capability flags are explicit columns rather than
/// nullable checks scattered through call sites: `has_balance` gates every
/// ledger operation, `is_paid` gates the balance-sufficiency check.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "Sick Leave",
        "slug": "sick-leave",
        "description": "Medical leave for illness",
        "is_paid": true,
        "max_days_per_year": 30,
        "requires_medical_document": true,
        "has_balance": true,
        "visible_to_employees": true,
        "is_active": true,
        "color": "#FA8C16"
    })
)]
pub struct LeaveType {
    #[schema(example = 3)]
    pub id: u64,

    #[schema(example = "Sick Leave")]
    pub name: String,

    #[schema(example = "sick-leave")]
    pub slug: String,

    #[schema(nullable = true)]
    pub description: Option<String>,

    #[schema(example = true)]
    pub is_paid: bool,

    /// Null means unlimited.
    #[schema(example = 30, nullable = true)]
    pub max_days_per_year: Option<i32>,

    #[schema(example = true)]
    pub requires_medical_document: bool,

    #[schema(example = true)]
    pub has_balance: bool,

    #[schema(example = true)]
    pub visible_to_employees: bool,

    #[schema(example = true)]
    pub is_active: bool,

    #[schema(example = "#FA8C16")]
    pub color: String,
}

impl LeaveType {
    /// Allocation granted when a balance row is created lazily.
    pub fn default_allocation(&self) -> i32 {
        self.max_days_per_year.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sick_leave() -> LeaveType {
        LeaveType {
            id: 3,
            name: "Sick Leave".into(),
            slug: "sick-leave".into(),
            description: None,
            is_paid: true,
            max_days_per_year: Some(30),
            requires_medical_document: true,
            has_balance: true,
            visible_to_employees: true,
            is_active: true,
            color: "#FA8C16".into(),
        }
    }

    #[test]
    fn default_allocation_uses_yearly_cap() {
        assert_eq!(sick_leave().default_allocation(), 30);
    }

    #[test]
    fn default_allocation_is_zero_for_unlimited_types() {
        let mut holidays = sick_leave();
        holidays.max_days_per_year = None;
        assert_eq!(holidays.default_allocation(), 0);
    }
}
