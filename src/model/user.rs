use crate::model::role::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "name": "Jane Doe",
        "email": "jane.doe@company.com",
        "role": "employee",
        "team_id": 2
    })
)]
pub struct User {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "Jane Doe")]
    pub name: String,

    #[schema(example = "jane.doe@company.com")]
    pub email: String,

    #[serde(skip_serializing)]
    #[schema(write_only)]
    pub password: String,

    #[schema(example = "employee")]
    pub role: Role,

    #[schema(example = 2, nullable = true)]
    pub team_id: Option<u64>,
}
