use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::leave::policy;
use crate::model::role::Role;
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

/// Columns admins may patch; anything else is rejected up front.
const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "slug",
    "description",
    "is_paid",
    "max_days_per_year",
    "requires_medical_document",
    "has_balance",
    "visible_to_employees",
    "is_active",
    "color",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "Sick Leave")]
    pub name: String,
    #[schema(example = "sick-leave")]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_paid: bool,
    #[schema(example = 30, nullable = true)]
    pub max_days_per_year: Option<i32>,
    #[serde(default)]
    pub requires_medical_document: bool,
    #[serde(default = "default_true")]
    pub has_balance: bool,
    #[serde(default = "default_true")]
    pub visible_to_employees: bool,
    #[schema(example = "#FA8C16", nullable = true)]
    pub color: Option<String>,
}

fn default_true() -> bool {
    true
}

/// The yearly cap may be set to null (unlimited) but never below 1.
fn validate_max_days_patch(patch: &Value) -> Result<(), ApiError> {
    match patch.get("max_days_per_year") {
        None | Some(Value::Null) => Ok(()),
        Some(value) => match value.as_i64() {
            Some(max) if max >= 1 => Ok(()),
            _ => Err(ApiError::validation(
                "max_days_per_year",
                "The yearly maximum must be at least 1 day.",
            )),
        },
    }
}

fn map_slug_conflict(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code() == Some("23000".into()) {
            return ApiError::validation("slug", "The slug is already in use.");
        }
    }
    ApiError::Db(e)
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveTypeResponse {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_paid: bool,
    pub max_days_per_year: Option<i32>,
    pub requires_medical_document: bool,
    pub has_balance: bool,
    pub visible_to_employees: bool,
    pub is_active: bool,
    pub color: String,
    #[schema(example = 12)]
    pub leave_requests_count: i64,
}

/// for listing leave types endpoint
#[utoipa::path(
    get,
    path = "/api/leave-types",
    responses(
        (status = 200, description = "Leave type list", body = [LeaveTypeResponse]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn list_leave_types(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    // Employees only see types offered to them; managers and admins see all.
    let scope = match auth.role {
        Role::Employee => " WHERE lt.is_active = 1 AND lt.visible_to_employees = 1",
        Role::Manager | Role::Admin => "",
    };

    let sql = format!(
        "SELECT lt.id, lt.name, lt.slug, lt.description, lt.is_paid, lt.max_days_per_year, \
                lt.requires_medical_document, lt.has_balance, lt.visible_to_employees, \
                lt.is_active, lt.color, \
                (SELECT COUNT(*) FROM leave_requests lr WHERE lr.leave_type_id = lt.id) \
                    AS leave_requests_count \
         FROM leave_types lt{scope} ORDER BY lt.id DESC"
    );

    let leave_types = sqlx::query_as::<_, LeaveTypeResponse>(&sql)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(leave_types))
}

/// Create Leave Type (admin)
#[utoipa::path(
    post,
    path = "/api/leave-types",
    request_body = CreateLeaveType,
    responses(
        (status = 201, description = "Leave type created"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeaveType>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may create leave types."));
    }
    if payload.max_days_per_year.is_some_and(|max| max < 1) {
        return Err(ApiError::validation(
            "max_days_per_year",
            "The yearly maximum must be at least 1 day.",
        ));
    }

    let result = sqlx::query(
        "INSERT INTO leave_types \
         (name, slug, description, is_paid, max_days_per_year, requires_medical_document, \
          has_balance, visible_to_employees, is_active, color) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&payload.name)
    .bind(&payload.slug)
    .bind(&payload.description)
    .bind(payload.is_paid)
    .bind(payload.max_days_per_year)
    .bind(payload.requires_medical_document)
    .bind(payload.has_balance)
    .bind(payload.visible_to_employees)
    .bind(payload.color.as_deref().unwrap_or("#1677FF"))
    .execute(pool.get_ref())
    .await
    .map_err(map_slug_conflict)?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": result.last_insert_id(),
        "message": "Leave type created"
    })))
}

/// Update Leave Type (admin)
#[utoipa::path(
    put,
    path = "/api/leave-types/{leave_type_id}",
    params(("leave_type_id" = u64, Path, description = "Leave type ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Leave type updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave type not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn update_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may update leave types."));
    }
    validate_max_days_patch(&body)?;

    let leave_type_id = path.into_inner();

    let update = build_update_sql("leave_types", &body, UPDATABLE_COLUMNS, "id", leave_type_id)
        .map_err(|e| ApiError::validation("payload", e.to_string()))?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(map_slug_conflict)?;

    if affected == 0 {
        return Err(ApiError::NotFound("leave type"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave type updated"
    })))
}

/// Delete Leave Type (admin); blocked while requests reference it
#[utoipa::path(
    delete,
    path = "/api/leave-types/{leave_type_id}",
    params(("leave_type_id" = u64, Path, description = "Leave type ID")),
    responses(
        (status = 200, description = "Leave type deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave type not found"),
        (status = 409, description = "Leave type still referenced")
    ),
    security(("bearer_auth" = [])),
    tag = "LeaveType"
)]
pub async fn delete_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may delete leave types."));
    }

    let leave_type_id = path.into_inner();

    let references = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leave_requests WHERE leave_type_id = ?",
    )
    .bind(leave_type_id)
    .fetch_one(pool.get_ref())
    .await?;

    if references > 0 {
        return Err(ApiError::state(format!(
            "Cannot delete leave type. There are {references} leave request(s) associated with this type."
        )));
    }

    let result = sqlx::query("DELETE FROM leave_types WHERE id = ?")
        .bind(leave_type_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("leave type"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave type deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patched_yearly_cap_must_stay_positive() {
        assert!(validate_max_days_patch(&json!({"max_days_per_year": 30})).is_ok());
        assert!(validate_max_days_patch(&json!({"max_days_per_year": 1})).is_ok());

        for bad in [json!(0), json!(-3), json!("ten"), json!(2.5)] {
            let err =
                validate_max_days_patch(&json!({"max_days_per_year": bad})).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[test]
    fn yearly_cap_may_be_cleared_or_left_alone() {
        // Null switches the type to unlimited.
        assert!(validate_max_days_patch(&json!({"max_days_per_year": null})).is_ok());
        // A patch not touching the cap is none of this check's business.
        assert!(validate_max_days_patch(&json!({"name": "Sick Leave"})).is_ok());
    }
}
