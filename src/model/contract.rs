use chrono::NaiveDate;
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
pub enum ContractType {
    /// Fixed daily rate, pro-rated by the attendance payment percentage.
    PerDay,
    /// Piece rate, paid per completed task share.
    PerTask,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Contract {
    pub id: u64,
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(example = "per_day")]
    pub contract_type: String,

    #[schema(example = "active")]
    pub status: String,

    #[schema(example = "2025-03-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub end_date: Option<NaiveDate>,

    #[schema(example = 30000.0, nullable = true)]
    pub daily_rate: Option<f64>,
}

impl Contract {
    pub fn kind(&self) -> Result<ContractType, AppError> {
        parse_column(&self.contract_type, "contract_type")
    }

    pub fn state(&self) -> Result<ContractStatus, AppError> {
        parse_column(&self.status, "status")
    }

    /// True when the contract has started on `day` and has not ended before it.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && self.end_date.is_none_or(|end| day <= end)
    }
}

#[cfg(test)]
pub(crate) fn per_day(id: u64, rate: Option<f64>, status: &str) -> Contract {
    Contract {
        id,
        worker_id: 1,
        project_id: 1,
        contract_type: "per_day".to_string(),
        status: status.to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: None,
        daily_rate: rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_open_ended_contract() {
        let c = per_day(1, Some(30000.0), "active");
        assert!(c.covers(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert!(!c.covers(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }

    #[test]
    fn covers_respects_end_date() {
        let mut c = per_day(1, Some(30000.0), "active");
        c.end_date = NaiveDate::from_ymd_opt(2025, 1, 31);
        assert!(c.covers(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
        assert!(!c.covers(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
    }

    #[test]
    fn parses_columns() {
        let c = per_day(1, None, "finished");
        assert_eq!(c.kind().unwrap(), ContractType::PerDay);
        assert_eq!(c.state().unwrap(), ContractStatus::Finished);
    }
}
