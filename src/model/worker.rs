use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "rut": "12345678-5",
        "full_name": "Juan Pérez",
        "role": "albañil",
        "phone": "+56912345678",
        "is_active": true,
        "created_at": "2025-03-01T08:00:00"
    })
)]
pub struct Worker {
    pub id: u64,

    /// Normalized RUT, `body-dv` without dots.
    #[schema(example = "12345678-5")]
    pub rut: String,

    pub full_name: String,

    #[schema(example = "albañil")]
    pub role: String,

    #[schema(nullable = true)]
    pub phone: Option<String>,

    pub is_active: bool,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
