use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::leave::{ledger, policy};
use crate::model::role::Role;
use crate::utils::db_utils::{build_update_sql, execute_update};
use crate::utils::user_cache;
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const UPDATABLE_COLUMNS: &[&str] = &["name", "email", "password", "role", "team_id"];

/// The role column only ever holds one of the closed enum's strings; a
/// patch carrying anything else must fail before it reaches the UPDATE.
fn validate_role_patch(patch: &Value) -> Result<(), ApiError> {
    match patch.get("role") {
        None => Ok(()),
        Some(value) => match value.as_str() {
            Some(role) if Role::from_str(role).is_ok() => Ok(()),
            _ => Err(ApiError::validation("role", "The selected role is invalid.")),
        },
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "Jordan Miles")]
    pub name: String,
    #[schema(example = "jordan@example.com")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    pub role: Role,
    #[schema(example = 2, nullable = true)]
    pub team_id: Option<u64>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct UserResponse {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub team_id: Option<u64>,
    pub team_name: Option<String>,
}

/// for listing users endpoint; managers are scoped to their own team
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "User list", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.actor();
    if !policy::can_list_users(&actor) {
        return Err(ApiError::forbidden("Only admins and managers may list users."));
    }

    let base = "SELECT u.id, u.name, u.email, u.role, u.team_id, t.name AS team_name \
                FROM users u LEFT JOIN teams t ON t.id = u.team_id";

    let users = match auth.role {
        Role::Admin => {
            sqlx::query_as::<_, UserResponse>(&format!("{base} ORDER BY u.name"))
                .fetch_all(pool.get_ref())
                .await?
        }
        _ => {
            // Managers only see members of their own team.
            let Some(team_id) = auth.team_id else {
                return Ok(HttpResponse::Ok().json(Vec::<UserResponse>::new()));
            };
            sqlx::query_as::<_, UserResponse>(&format!(
                "{base} WHERE u.team_id = ? ORDER BY u.name"
            ))
            .bind(team_id)
            .fetch_all(pool.get_ref())
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(users))
}

/// Create User (admin); employees get the year's balances provisioned
/// from the active balance-tracked leave types in the same transaction.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may create users."));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::validation(
            "password",
            "The password must be at least 8 characters.",
        ));
    }

    let hashed = hash_password(&payload.password);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO users (name, email, password, role, team_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&hashed)
    .bind(payload.role)
    .bind(payload.team_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code() == Some("23000".into()) {
                return ApiError::validation("email", "The email is already in use.");
            }
        }
        ApiError::Db(e)
    })?;

    let user_id = result.last_insert_id();

    if payload.role == Role::Employee {
        let year = Utc::now().date_naive().year();
        ledger::provision_for_user(&mut tx, user_id, year).await?;
    }

    tx.commit().await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": user_id,
        "message": "User created"
    })))
}

/// Update User (admin). A supplied password is re-hashed; a role change
/// to employee triggers balance provisioning for the current year.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    request_body = Object,
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may update users."));
    }

    let user_id = path.into_inner();
    let mut patch = body.into_inner();

    validate_role_patch(&patch)?;

    if let Some(password) = patch.get("password").and_then(Value::as_str) {
        if password.len() < 8 {
            return Err(ApiError::validation(
                "password",
                "The password must be at least 8 characters.",
            ));
        }
        patch["password"] = Value::String(hash_password(password));
    }

    let becomes_employee = patch.get("role").and_then(Value::as_str) == Some("employee");

    let update = build_update_sql("users", &patch, UPDATABLE_COLUMNS, "id", user_id)
        .map_err(|e| ApiError::validation("payload", e.to_string()))?;

    let affected = execute_update(pool.get_ref(), update).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("user"));
    }

    if becomes_employee {
        let mut conn = pool.acquire().await?;
        ledger::provision_for_user(&mut conn, user_id, Utc::now().date_naive().year()).await?;
    }

    user_cache::invalidate(user_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User updated"
    })))
}

/// Delete User (admin, not yourself)
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Attempted self-deletion")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may delete users."));
    }

    let user_id = path.into_inner();
    if user_id == auth.user_id {
        return Err(ApiError::validation(
            "user_id",
            "You cannot delete your own account.",
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user"));
    }

    user_cache::invalidate(user_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_patch_only_accepts_known_roles() {
        for role in ["admin", "manager", "employee"] {
            assert!(validate_role_patch(&json!({"role": role})).is_ok());
        }

        for bad in [json!("superadmin"), json!("Employee"), json!(1), json!(null)] {
            let err = validate_role_patch(&json!({"role": bad})).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[test]
    fn patches_without_a_role_pass_untouched() {
        assert!(validate_role_patch(&json!({"name": "Jordan Miles"})).is_ok());
    }
}
