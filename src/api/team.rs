use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::leave::policy;
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const UPDATABLE_COLUMNS: &[&str] = &["name", "manager_id", "description", "is_active"];

#[derive(Deserialize, ToSchema)]
pub struct CreateTeam {
    #[schema(example = "Platform")]
    pub name: String,
    #[schema(example = 4, nullable = true)]
    pub manager_id: Option<u64>,
    pub description: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct TeamResponse {
    pub id: u64,
    pub name: String,
    pub manager_id: Option<u64>,
    pub manager_name: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    #[schema(example = 9)]
    pub members_count: i64,
}

/// for listing teams endpoint
#[utoipa::path(
    get,
    path = "/api/teams",
    responses(
        (status = 200, description = "Team list", body = [TeamResponse]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Team"
)]
pub async fn list_teams(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let teams = sqlx::query_as::<_, TeamResponse>(
        "SELECT t.id, t.name, t.manager_id, m.name AS manager_name, t.description, t.is_active, \
                (SELECT COUNT(*) FROM users u WHERE u.team_id = t.id) AS members_count \
         FROM teams t \
         LEFT JOIN users m ON m.id = t.manager_id \
         ORDER BY t.name",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(teams))
}

/// Create Team (admin)
#[utoipa::path(
    post,
    path = "/api/teams",
    request_body = CreateTeam,
    responses(
        (status = 201, description = "Team created"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Team"
)]
pub async fn create_team(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTeam>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may create teams."));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("name", "The team name is required."));
    }

    if let Some(manager_id) = payload.manager_id {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(manager_id)
            .fetch_one(pool.get_ref())
            .await?;
        if exists == 0 {
            return Err(ApiError::validation(
                "manager_id",
                "The selected manager does not exist.",
            ));
        }
    }

    let result = sqlx::query(
        "INSERT INTO teams (name, manager_id, description, is_active) VALUES (?, ?, ?, 1)",
    )
    .bind(&payload.name)
    .bind(payload.manager_id)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": result.last_insert_id(),
        "message": "Team created"
    })))
}

/// Update Team (admin)
#[utoipa::path(
    put,
    path = "/api/teams/{team_id}",
    params(("team_id" = u64, Path, description = "Team ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Team updated"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Team"
)]
pub async fn update_team(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let team_id = path.into_inner();

    let update = build_update_sql("teams", &body, UPDATABLE_COLUMNS, "id", team_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Team not found"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Team updated"
    })))
}

/// Delete Team (admin); members keep their accounts and lose the team link.
#[utoipa::path(
    delete,
    path = "/api/teams/{team_id}",
    params(("team_id" = u64, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Team"
)]
pub async fn delete_team(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    if !policy::can_manage_directory(&auth.actor()) {
        return Err(ApiError::forbidden("Only admins may delete teams."));
    }

    let result = sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("team"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Team deleted"
    })))
}
