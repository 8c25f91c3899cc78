use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    AsRefStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentType {
    /// Piece-rate payment for completed task shares.
    #[serde(rename = "a_trato")]
    #[strum(serialize = "a_trato")]
    ATrato,
    /// Per-day payment for attendance.
    PorDia,
    Custom,
}

/// Immutable record of one processed payment batch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PaymentHistoryRecord {
    pub id: u64,
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(example = "por_dia")]
    pub payment_type: String,

    #[schema(example = 45000.0)]
    pub amount: f64,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub period_start: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub period_end: Option<NaiveDate>,

    #[schema(nullable = true)]
    pub days_count: Option<i32>,

    #[schema(nullable = true)]
    pub task_id: Option<u64>,

    #[schema(nullable = true)]
    pub tasks_count: Option<i32>,

    #[schema(nullable = true)]
    pub notes: Option<String>,

    pub processed_by: u64,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_column_names() {
        assert_eq!(PaymentType::ATrato.to_string(), "a_trato");
        assert_eq!(PaymentType::PorDia.to_string(), "por_dia");
        assert_eq!("custom".parse::<PaymentType>().unwrap(), PaymentType::Custom);
    }
}
