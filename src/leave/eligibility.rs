//! Pre-commit validation of a prospective leave request. Pure: the caller
//! fetches everything the checks need (including `today`, so tests run on
//! fixed dates) and every violated rule is reported, not just the first.

use chrono::NaiveDate;

use crate::error::FieldError;
use crate::model::{
    leave_balance::LeaveBalance,
    leave_request::day_count,
    leave_type::LeaveType,
    user::User,
};

/// Everything `validate` looks at, fetched up front by the lifecycle.
pub struct ValidationContext<'a> {
    /// The user the leave is for (may differ from the actor when a manager
    /// or admin submits on behalf of someone).
    pub target: &'a User,
    pub leave_type: &'a LeaveType,
    pub today: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub document: Option<&'a str>,
    /// Balance row for (target, leave type, year), if one exists. Absence is
    /// not an error; it means "no usage yet" and skips the sufficiency check.
    pub balance: Option<&'a LeaveBalance>,
    /// Date ranges of the target's *approved* requests.
    pub approved: &'a [(NaiveDate, NaiveDate)],
}

/// Inclusive interval intersection, containment in either direction included.
pub fn overlaps(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Runs every rule and returns the recomputed inclusive day count on
/// success, or the full list of violations.
pub fn validate(ctx: &ValidationContext) -> Result<i32, Vec<FieldError>> {
    let mut errors = Vec::new();

    if ctx.start_date < ctx.today {
        errors.push(FieldError::new(
            "start_date",
            "The start date must be today or later.",
        ));
    }

    let dates_ordered = ctx.end_date >= ctx.start_date;
    if !dates_ordered {
        errors.push(FieldError::new(
            "end_date",
            "The end date must be on or after the start date.",
        ));
    }

    if !ctx.leave_type.is_active {
        errors.push(FieldError::new(
            "leave_type_id",
            "The selected leave type is not active.",
        ));
    }

    if ctx.leave_type.requires_medical_document
        && ctx.document.map_or(true, |d| d.trim().is_empty())
    {
        errors.push(FieldError::new(
            "document",
            "A medical document is required for this leave type.",
        ));
    }

    let total_days = day_count(ctx.start_date, ctx.end_date);

    if dates_ordered {
        if let Some(max) = ctx.leave_type.max_days_per_year {
            if total_days > max {
                errors.push(FieldError::new(
                    "end_date",
                    format!("Maximum days allowed for this leave type is {max} days."),
                ));
            }
        }

        // Sufficiency applies to paid types only, and only when a balance
        // row already exists for the year.
        if ctx.leave_type.is_paid {
            if let Some(balance) = ctx.balance {
                let available = balance.available_days();
                if total_days > available {
                    errors.push(FieldError::new(
                        "end_date",
                        format!(
                            "{} only has {available} days available for this leave type.",
                            ctx.target.name
                        ),
                    ));
                }
            }
        }
    }

    if ctx
        .approved
        .iter()
        .any(|range| overlaps((ctx.start_date, ctx.end_date), *range))
    {
        errors.push(FieldError::new(
            "start_date",
            format!("{} has an overlapping approved leave request.", ctx.target.name),
        ));
    }

    if errors.is_empty() {
        Ok(total_days)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn target() -> User {
        User {
            id: 7,
            name: "Jane Doe".into(),
            email: "jane.doe@company.com".into(),
            password: String::new(),
            role: Role::Employee,
            team_id: Some(2),
        }
    }

    fn paid_type(max: Option<i32>) -> LeaveType {
        LeaveType {
            id: 3,
            name: "Sick Leave".into(),
            slug: "sick-leave".into(),
            description: None,
            is_paid: true,
            max_days_per_year: max,
            requires_medical_document: false,
            has_balance: true,
            visible_to_employees: true,
            is_active: true,
            color: "#FA8C16".into(),
        }
    }

    fn balance(total: i32, used: i32, pending: i32) -> LeaveBalance {
        LeaveBalance {
            id: 11,
            user_id: 7,
            leave_type_id: 3,
            year: 2026,
            total_days: total,
            used_days: used,
            pending_days: pending,
        }
    }

    struct Fixture {
        target: User,
        leave_type: LeaveType,
        balance: Option<LeaveBalance>,
        approved: Vec<(NaiveDate, NaiveDate)>,
        start: NaiveDate,
        end: NaiveDate,
        document: Option<String>,
    }

    impl Fixture {
        fn new(start: NaiveDate, end: NaiveDate) -> Self {
            Self {
                target: target(),
                leave_type: paid_type(Some(30)),
                balance: None,
                approved: Vec::new(),
                start,
                end,
                document: None,
            }
        }

        fn validate(&self) -> Result<i32, Vec<FieldError>> {
            validate(&ValidationContext {
                target: &self.target,
                leave_type: &self.leave_type,
                today: date(2026, 1, 1),
                start_date: self.start,
                end_date: self.end,
                document: self.document.as_deref(),
                balance: self.balance.as_ref(),
                approved: &self.approved,
            })
        }
    }

    fn fields(result: Result<i32, Vec<FieldError>>) -> Vec<String> {
        result
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn a_clean_request_passes_and_reports_the_day_count() {
        let fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 3));
        assert_eq!(fx.validate().unwrap(), 3);
    }

    #[test]
    fn start_in_the_past_is_rejected() {
        let fx = Fixture::new(date(2025, 12, 30), date(2026, 1, 2));
        assert_eq!(fields(fx.validate()), vec!["start_date"]);
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let fx = Fixture::new(date(2026, 2, 3), date(2026, 2, 1));
        assert_eq!(fields(fx.validate()), vec!["end_date"]);
    }

    #[test]
    fn overlap_with_approved_leave_is_rejected() {
        let mut fx = Fixture::new(date(2026, 1, 12), date(2026, 1, 13));
        fx.approved = vec![(date(2026, 1, 10), date(2026, 1, 15))];
        let errors = fx.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "start_date");
        assert!(errors[0].message.contains("Jane Doe"));
        assert!(errors[0].message.contains("overlapping"));

        // Directly after the approved range is fine.
        fx.start = date(2026, 1, 16);
        fx.end = date(2026, 1, 20);
        assert!(fx.validate().is_ok());
    }

    #[test]
    fn containment_counts_as_overlap_in_both_directions() {
        let existing = (date(2026, 1, 10), date(2026, 1, 15));
        // New range swallows the existing one.
        assert!(overlaps((date(2026, 1, 8), date(2026, 1, 20)), existing));
        // New range sits inside the existing one.
        assert!(overlaps((date(2026, 1, 11), date(2026, 1, 12)), existing));
        // Single shared boundary day still overlaps.
        assert!(overlaps((date(2026, 1, 15), date(2026, 1, 18)), existing));
        assert!(!overlaps((date(2026, 1, 16), date(2026, 1, 18)), existing));
    }

    #[test]
    fn max_days_per_year_is_enforced_and_named() {
        let mut fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 6));
        fx.leave_type = paid_type(Some(5));
        let errors = fx.validate().unwrap_err();
        assert_eq!(errors[0].field, "end_date");
        assert!(errors[0].message.contains('5'));

        fx.end = date(2026, 2, 5);
        assert_eq!(fx.validate().unwrap(), 5);
    }

    #[test]
    fn unlimited_types_skip_the_max_days_check() {
        let mut fx = Fixture::new(date(2026, 2, 1), date(2026, 4, 30));
        fx.leave_type = paid_type(None);
        assert!(fx.validate().is_ok());
    }

    #[test]
    fn insufficient_balance_is_rejected_with_the_targets_name() {
        let mut fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 3));
        fx.balance = Some(balance(30, 25, 3)); // 2 available
        let errors = fx.validate().unwrap_err();
        assert!(errors[0].message.contains("Jane Doe only has 2 days available"));

        fx.end = date(2026, 2, 2); // exactly 2 days
        assert_eq!(fx.validate().unwrap(), 2);
    }

    #[test]
    fn missing_balance_row_skips_the_sufficiency_check() {
        let fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 20));
        assert!(fx.validate().is_ok());
    }

    #[test]
    fn unpaid_types_skip_the_sufficiency_check() {
        let mut fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 10));
        fx.leave_type.is_paid = false;
        fx.balance = Some(balance(2, 0, 0));
        assert!(fx.validate().is_ok());
    }

    #[test]
    fn medical_document_requirement() {
        let mut fx = Fixture::new(date(2026, 2, 1), date(2026, 2, 3));
        fx.leave_type.requires_medical_document = true;
        assert_eq!(fields(fx.validate()), vec!["document"]);

        fx.document = Some("  ".into());
        assert_eq!(fields(fx.validate()), vec!["document"]);

        fx.document = Some("leave-documents/scan.pdf".into());
        assert!(fx.validate().is_ok());
    }

    #[test]
    fn all_violations_accumulate() {
        let mut fx = Fixture::new(date(2025, 12, 20), date(2026, 1, 12));
        fx.leave_type = paid_type(Some(5));
        fx.leave_type.is_active = false;
        fx.approved = vec![(date(2026, 1, 10), date(2026, 1, 15))];
        let got = fields(fx.validate());
        assert_eq!(
            got,
            vec!["start_date", "leave_type_id", "end_date", "start_date"]
        );
    }
}
