use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::parse_column;
use crate::error::AppError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
    OnHold,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// An assignment is never deleted; removal flips it to `Removed` so recorded
/// payments keep their history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Task {
    pub id: u64,
    pub apartment_id: u64,
    pub name: String,

    #[schema(example = "in_progress")]
    pub status: String,

    #[schema(example = "medium")]
    pub priority: String,

    #[schema(example = 100000.0)]
    pub total_budget: f64,

    #[schema(example = "active")]
    pub lifecycle: String,
}

impl Task {
    pub fn state(&self) -> Result<TaskStatus, AppError> {
        parse_column(&self.status, "status")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TaskAssignment {
    pub id: u64,
    pub task_id: u64,
    pub worker_id: u64,

    /// Share of the task budget, 0-100.
    #[schema(example = 50.0)]
    pub percentage: f64,

    #[schema(example = 50000.0)]
    pub worker_payment: f64,

    /// Contract type at the time of assignment (`a_trato` or `por_dia`).
    #[schema(example = "a_trato")]
    pub contract_type: String,

    #[schema(example = "active")]
    pub assignment_status: String,

    pub is_paid: bool,
}

impl TaskAssignment {
    pub fn status(&self) -> Result<AssignmentStatus, AppError> {
        parse_column(&self.assignment_status, "assignment_status")
    }
}
