use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// A single violated validation rule, scoped to the offending input field.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldError {
    #[schema(example = "end_date")]
    pub field: String,
    #[schema(example = "Maximum days allowed for this leave type is 5 days.")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error taxonomy of the engine. All variants except `Db` are expected,
/// recoverable-by-caller outcomes and are never retried automatically.
#[derive(Debug, Error)]
pub enum ApiError {
    /// One or more field-scoped rule violations; all are reported, not just
    /// the first.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// The actor lacks permission for the requested operation.
    #[error("{0}")]
    Forbidden(String),

    /// Transition attempted from a non-pending request.
    #[error("{0}")]
    State(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error")]
    Db(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        ApiError::State(message.into())
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::State(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Validation(errors) => {
                HttpResponse::UnprocessableEntity().json(json!({
                    "message": "Validation failed",
                    "errors": errors,
                }))
            }
            ApiError::Forbidden(message) => {
                HttpResponse::Forbidden().json(json!({ "message": message }))
            }
            ApiError::State(message) => {
                HttpResponse::Conflict().json(json!({ "message": message }))
            }
            ApiError::NotFound(what) => HttpResponse::NotFound().json(json!({
                "message": format!("{what} not found"),
            })),
            ApiError::Db(e) => {
                tracing::error!(error = %e, "Database error");
                HttpResponse::InternalServerError().json(json!({
                    "message": "Internal Server Error",
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation("start_date", "bad").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::forbidden("no").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::state("already approved").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::NotFound("leave request").status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
