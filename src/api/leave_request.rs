use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::leave::lifecycle::{self, CreateLeaveInput, Decision, UpdateLeaveInput};
use crate::leave::policy;
use crate::model::{leave_request::LeaveStatus, role::Role};
use crate::utils::user_cache;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    /// On-behalf target for managers/admins; omitted = the caller.
    #[schema(example = 7, nullable = true)]
    pub user_id: Option<u64>,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = "2026-02-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Flu", nullable = true)]
    pub reason: Option<String>,
    /// Opaque blob-store path of an uploaded document.
    #[schema(example = "leave-documents/scan.pdf", nullable = true)]
    pub document: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeave {
    pub leave_type_id: Option<u64>,
    #[schema(example = "2026-02-02", format = "date", value_type = String)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-02-04", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
    /// Omit to keep the stored reason, send null to clear it.
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(example = "Flu", nullable = true, value_type = Option<String>)]
    pub reason: Option<Option<String>>,
    /// Omit to keep the stored document, send null to clear it.
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(nullable = true, value_type = Option<String>)]
    pub document: Option<Option<String>>,
}

/// Maps an absent key to `None` (via the serde default) and a present key,
/// null included, to `Some(...)`.
fn patch_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Project deadline that week")]
    pub rejection_reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = "pending")]
    /// Filter by request status
    pub status: Option<LeaveStatus>,
    #[schema(example = 3)]
    /// Filter by leave type
    pub leave_type_id: Option<u64>,
    #[schema(example = 7)]
    /// Filter by requester (managers/admins)
    pub user_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    /// Requests starting on or after this date
    pub date_from: Option<NaiveDate>,
    #[schema(example = "2026-12-31", format = "date", value_type = String)]
    /// Requests ending on or before this date
    pub date_to: Option<NaiveDate>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 15)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "Jane Doe")]
    pub user_name: String,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = "Sick Leave")]
    pub leave_type_name: String,
    #[schema(example = "2026-02-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub total_days: i32,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: LeaveStatus,
    #[schema(example = 4, nullable = true)]
    pub approved_by: Option<u64>,
    #[sqlx(default)]
    #[schema(example = "Max Mustermann", nullable = true)]
    pub approver_name: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Clamped pagination window: (page, per_page, offset). Oversized query
/// values cannot overflow the offset arithmetic.
fn page_window(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, u64) {
    let per_page = per_page.unwrap_or(15).clamp(1, 100);
    let page = page.unwrap_or(1).clamp(1, 1_000_000);
    (page, per_page, (page - 1) * per_page)
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 15)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let request = lifecycle::create(
        pool.get_ref(),
        &auth.actor(),
        CreateLeaveInput {
            target_user_id: payload.user_id,
            leave_type_id: payload.leave_type_id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            reason: payload.reason,
            document: payload.document,
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(request))
}

/* =========================
Approve leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let request = lifecycle::decide(
        pool.get_ref(),
        &auth.actor(),
        path.into_inner(),
        Decision::Approve,
        None,
    )
    .await?;

    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Reject leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed"),
        (status = 422, description = "Missing rejection reason")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> Result<HttpResponse, ApiError> {
    let request = lifecycle::decide(
        pool.get_ref(),
        &auth.actor(),
        path.into_inner(),
        Decision::Reject,
        Some(payload.into_inner().rejection_reason),
    )
    .await?;

    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Update leave (pending only)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to update")),
    request_body = UpdateLeave,
    responses(
        (status = 200, description = "Leave request updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeave>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let request = lifecycle::update(
        pool.get_ref(),
        &auth.actor(),
        path.into_inner(),
        UpdateLeaveInput {
            leave_type_id: payload.leave_type_id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            reason: payload.reason,
            document: payload.document,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Delete leave (pending only)
========================= */
#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to delete")),
    responses(
        (status = 200, description = "Leave request deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    lifecycle::delete(pool.get_ref(), &auth.actor(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request deleted"
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave_id = path.into_inner();

    let mut conn = pool.acquire().await?;
    let request = lifecycle::fetch_request(&mut conn, leave_id)
        .await?
        .ok_or(ApiError::NotFound("leave request"))?;
    let owner = lifecycle::fetch_user(&mut conn, request.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if !policy::can_view_request(&auth.actor(), &owner) {
        return Err(ApiError::forbidden("You may not view this leave request."));
    }

    Ok(HttpResponse::Ok().json(request))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, ApiError> {
    // -------------------------
    // Pagination
    // -------------------------
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    // -------------------------
    // WHERE clause (role scope first, then filters)
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    match auth.role {
        Role::Employee => {
            where_sql.push_str(" AND lr.user_id = ?");
            args.push(FilterValue::U64(auth.user_id));
        }
        Role::Manager => {
            where_sql.push_str(" AND u.team_id = ?");
            args.push(FilterValue::U64(auth.team_id.unwrap_or(0)));
        }
        Role::Admin => {}
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND lr.status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    if let Some(leave_type_id) = query.leave_type_id {
        where_sql.push_str(" AND lr.leave_type_id = ?");
        args.push(FilterValue::U64(leave_type_id));
    }

    if let Some(user_id) = query.user_id {
        where_sql.push_str(" AND lr.user_id = ?");
        args.push(FilterValue::U64(user_id));
    }

    if let Some(date_from) = query.date_from {
        where_sql.push_str(" AND lr.start_date >= ?");
        args.push(FilterValue::Date(date_from));
    }

    if let Some(date_to) = query.date_to {
        where_sql.push_str(" AND lr.end_date <= ?");
        args.push(FilterValue::Date(date_to));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!(
        "SELECT COUNT(*) FROM leave_requests lr JOIN users u ON u.id = lr.user_id{}",
        where_sql
    );

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.clone()),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        "SELECT lr.id, lr.user_id, u.name AS user_name, lr.leave_type_id, \
                lt.name AS leave_type_name, lr.start_date, lr.end_date, lr.total_days, \
                lr.reason, lr.status, lr.approved_by, lr.created_at \
         FROM leave_requests lr \
         JOIN users u ON u.id = lr.user_id \
         JOIN leave_types lt ON lt.id = lr.leave_type_id\
         {} ORDER BY lr.created_at DESC LIMIT ? OFFSET ?",
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveResponse>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }

    let mut leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    for leave in &mut leaves {
        if let Some(approver_id) = leave.approved_by {
            leave.approver_name = user_cache::display_name(pool.get_ref(), approver_id).await;
        }
    }

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(page_window(None, None), (1, 15, 0));
        assert_eq!(page_window(Some(3), Some(20)), (3, 20, 40));
        // per_page is capped at 100 and floored at 1.
        assert_eq!(page_window(Some(1), Some(5000)).1, 100);
        assert_eq!(page_window(Some(1), Some(0)).1, 1);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let (page, per_page, offset) = page_window(Some(u64::MAX), Some(100));
        assert_eq!(page, 1_000_000);
        assert_eq!(offset, (page - 1) * per_page);
    }

    #[test]
    fn update_payload_distinguishes_absent_from_null() {
        let keep: UpdateLeave = serde_json::from_str(r#"{"start_date": "2026-02-02"}"#).unwrap();
        assert_eq!(keep.reason, None);
        assert_eq!(keep.document, None);

        let clear: UpdateLeave =
            serde_json::from_str(r#"{"reason": null, "document": null}"#).unwrap();
        assert_eq!(clear.reason, Some(None));
        assert_eq!(clear.document, Some(None));

        let replace: UpdateLeave = serde_json::from_str(r#"{"reason": "Moved"}"#).unwrap();
        assert_eq!(replace.reason, Some(Some("Moved".to_string())));
    }
}
