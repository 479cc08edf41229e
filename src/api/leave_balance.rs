use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::leave::{ledger, lifecycle, policy};
use crate::model::role::Role;
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    /// Defaults to the caller; other users are admin-only.
    #[schema(example = 7)]
    pub user_id: Option<u64>,
    /// Defaults to the current calendar year.
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetAllocation {
    #[schema(example = 25)]
    pub total_days: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct GlobalLimits {
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = 25)]
    pub total_days: i32,
    /// Defaults to the current calendar year.
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

/// Balances for one user and year, one line per active balance-tracked
/// leave type; types without a row yet get synthesized zero-usage defaults.
#[utoipa::path(
    get,
    path = "/api/balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balance list", body = [ledger::BalanceSummary]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn list_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let target_user_id = query.user_id.unwrap_or(auth.user_id);
    if !policy::can_view_balances_of(&auth.actor(), target_user_id) {
        return Err(ApiError::forbidden(
            "You may only view your own leave balances.",
        ));
    }

    let year = query.year.unwrap_or_else(|| Utc::now().date_naive().year());
    let balances = ledger::balances_with_defaults(pool.get_ref(), target_user_id, year).await?;

    Ok(HttpResponse::Ok().json(balances))
}

/// Admin override of a single allocation.
#[utoipa::path(
    put,
    path = "/api/balances/{balance_id}",
    params(("balance_id" = u64, Path, description = "Balance row ID")),
    request_body = SetAllocation,
    responses(
        (status = 200, description = "Allocation updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Balance not found"),
        (status = 422, description = "Negative allocation")
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn set_allocation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SetAllocation>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may change allocations."));
    }
    if payload.total_days < 0 {
        return Err(ApiError::validation(
            "total_days",
            "The allocation must be zero or more days.",
        ));
    }

    let affected =
        ledger::set_allocation(pool.get_ref(), path.into_inner(), payload.total_days).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("leave balance"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave balance updated"
    })))
}

/// Global leave limits: one set-based upsert of the allocation for every
/// employee for a leave type and year.
#[utoipa::path(
    post,
    path = "/api/balances/global-limits",
    request_body = GlobalLimits,
    responses(
        (status = 200, description = "Global limits applied"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn set_global_limits(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GlobalLimits>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may set global limits."));
    }
    if payload.total_days < 0 {
        return Err(ApiError::validation(
            "total_days",
            "The allocation must be zero or more days.",
        ));
    }

    let mut conn = pool.acquire().await?;
    if lifecycle::fetch_leave_type(&mut conn, payload.leave_type_id)
        .await?
        .is_none()
    {
        return Err(ApiError::validation(
            "leave_type_id",
            "The selected leave type does not exist.",
        ));
    }
    drop(conn);

    let year = payload.year.unwrap_or_else(|| Utc::now().date_naive().year());
    ledger::bulk_set_allocation(
        pool.get_ref(),
        payload.leave_type_id,
        payload.total_days,
        year,
        &[Role::Employee],
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Global leave limits updated"
    })))
}
