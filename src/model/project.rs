use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Project {
    pub id: u64,
    pub name: String,

    #[schema(nullable = true)]
    pub address: Option<String>,

    #[schema(example = "active")]
    pub lifecycle: String,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Tower {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    pub lifecycle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Floor {
    pub id: u64,
    pub tower_id: u64,
    pub floor_number: i32,
    pub lifecycle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Apartment {
    pub id: u64,
    pub floor_id: u64,
    pub apartment_number: String,
    pub lifecycle: String,
}
