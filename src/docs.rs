use crate::api::leave_balance::{BalanceQuery, GlobalLimits, SetAllocation};
use crate::api::leave_request::{
    CreateLeave, LeaveFilter, LeaveListResponse, LeaveResponse, RejectLeave, UpdateLeave,
};
use crate::api::leave_type::{CreateLeaveType, LeaveTypeResponse};
use crate::api::team::{CreateTeam, TeamResponse};
use crate::api::user::{CreateUser, UserResponse};
use crate::error::FieldError;
use crate::leave::ledger::BalanceSummary;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::model::role::Role;
use crate::model::team::Team;
use crate::model::user::User;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Management API",
        version = "1.0.0",
        description = r#"
## Employee Leave Management System

This API powers an **employee leave management** system: balances, requests,
approvals, and the directory data behind them.

### 🔹 Key Features
- **Leave Requests**
  - Apply for leave (or on behalf of a report), edit or withdraw while pending
- **Approvals**
  - Managers decide for their own team, admins for everyone
- **Leave Balances**
  - Per-user yearly allocations with reserved/used accounting, admin overrides,
    and global limits applied across all employees at once
- **Directory**
  - Leave types, teams, and user accounts

### 🔐 Security
All endpoints except `/auth/*` require **JWT Bearer authentication**.
What a caller can see and do follows their role: **admin**, **manager**,
or **employee**.

### 📦 Response Format
- JSON-based RESTful responses
- Validation errors return every violated rule, field by field
- Pagination supported for the leave list

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::set_allocation,
        crate::api::leave_balance::set_global_limits,

        crate::api::leave_type::list_leave_types,
        crate::api::leave_type::create_leave_type,
        crate::api::leave_type::update_leave_type,
        crate::api::leave_type::delete_leave_type,

        crate::api::team::list_teams,
        crate::api::team::create_team,
        crate::api::team::update_team,
        crate::api::team::delete_team,

        crate::api::user::list_users,
        crate::api::user::create_user,
        crate::api::user::update_user,
        crate::api::user::delete_user
    ),
    components(
        schemas(
            Role,
            LeaveStatus,
            User,
            Team,
            LeaveType,
            LeaveBalance,
            LeaveRequest,
            FieldError,
            LeaveFilter,
            CreateLeave,
            UpdateLeave,
            RejectLeave,
            LeaveResponse,
            LeaveListResponse,
            BalanceQuery,
            SetAllocation,
            GlobalLimits,
            BalanceSummary,
            CreateLeaveType,
            LeaveTypeResponse,
            CreateTeam,
            TeamResponse,
            CreateUser,
            UserResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave request lifecycle APIs"),
        (name = "Balance", description = "Leave balance APIs"),
        (name = "LeaveType", description = "Leave type catalog APIs"),
        (name = "Team", description = "Team directory APIs"),
        (name = "User", description = "User account APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
