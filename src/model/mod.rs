pub mod attendance;
pub mod contract;
pub mod invoice;
pub mod job_application;
pub mod lifecycle;
pub mod payment;
pub mod preferences;
pub mod project;
pub mod role;
pub mod task;
pub mod worker;

use std::str::FromStr;

use crate::error::AppError;

/// Parses a status column stored as text into its enum.
pub fn parse_column<T: FromStr>(raw: &str, column: &'static str) -> Result<T, AppError> {
    raw.parse::<T>()
        .map_err(|_| AppError::Internal(format!("unexpected {} value '{}'", column, raw)))
}
