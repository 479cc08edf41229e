use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Team {
    #[schema(example = 2)]
    pub id: u64,

    #[schema(example = "Platform")]
    pub name: String,

    /// Designated manager of record; the only manager allowed to approve
    /// this team's leave requests.
    #[schema(example = 4, nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(nullable = true)]
    pub description: Option<String>,

    #[schema(example = true)]
    pub is_active: bool,
}
