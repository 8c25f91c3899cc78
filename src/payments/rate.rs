use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{MySql, MySqlPool};
use utoipa::ToSchema;

use super::PaymentError;
use crate::model::contract::{Contract, ContractStatus, ContractType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RateCandidate {
    pub contract_id: u64,
    pub daily_rate: f64,
}

/// Outcome of looking up the daily rate for a (worker, project) pair. Only one
/// active per-day contract is expected; more than one is reported rather than
/// silently picking a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateResolution {
    Found { contract_id: u64, daily_rate: f64 },
    NotFound,
    Ambiguous { candidates: Vec<RateCandidate> },
}

impl RateResolution {
    /// Picks the active per-day contracts among `contracts`. When `on` is set,
    /// contracts that do not cover that day are ignored.
    pub fn resolve(contracts: &[Contract], on: Option<NaiveDate>) -> Self {
        let candidates: Vec<RateCandidate> = contracts
            .iter()
            .filter(|c| matches!(c.kind(), Ok(ContractType::PerDay)))
            .filter(|c| matches!(c.state(), Ok(ContractStatus::Active)))
            .filter(|c| on.is_none_or(|day| c.covers(day)))
            .filter_map(|c| {
                c.daily_rate.map(|daily_rate| RateCandidate {
                    contract_id: c.id,
                    daily_rate,
                })
            })
            .collect();

        match candidates.as_slice() {
            [] => RateResolution::NotFound,
            [one] => RateResolution::Found {
                contract_id: one.contract_id,
                daily_rate: one.daily_rate,
            },
            _ => RateResolution::Ambiguous { candidates },
        }
    }

    /// Rate used for previews and summaries; unresolved rates count as 0.
    pub fn rate_or_zero(&self) -> f64 {
        match self {
            RateResolution::Found { daily_rate, .. } => *daily_rate,
            _ => 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RateResolution::Found { .. })
    }

    /// Rate required for processing a payment.
    pub fn require(&self) -> Result<(u64, f64), PaymentError> {
        match self {
            RateResolution::Found {
                contract_id,
                daily_rate,
            } => Ok((*contract_id, *daily_rate)),
            RateResolution::NotFound => Err(PaymentError::RateNotFound),
            RateResolution::Ambiguous { candidates } => {
                Err(PaymentError::RateAmbiguous(candidates.len()))
            }
        }
    }
}

/// Groups contracts by (worker, project) so each day can be resolved against
/// the contracts of its own pair.
pub fn group_by_pair(contracts: Vec<Contract>) -> HashMap<(u64, u64), Vec<Contract>> {
    let mut grouped: HashMap<(u64, u64), Vec<Contract>> = HashMap::new();
    for c in contracts {
        grouped.entry((c.worker_id, c.project_id)).or_default().push(c);
    }
    grouped
}

const CONTRACT_COLUMNS: &str = "id, worker_id, project_id, contract_type, status, start_date, end_date, daily_rate";

pub async fn load_per_day_contracts<'e, E>(
    executor: E,
    worker_id: u64,
    project_id: u64,
) -> Result<Vec<Contract>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!(
        "SELECT {} FROM contract_history WHERE worker_id = ? AND project_id = ? AND contract_type = ? AND status = ?",
        CONTRACT_COLUMNS
    );
    sqlx::query_as::<_, Contract>(&sql)
        .bind(worker_id)
        .bind(project_id)
        .bind(ContractType::PerDay.to_string())
        .bind(ContractStatus::Active.to_string())
        .fetch_all(executor)
        .await
}

pub async fn load_all_active_per_day(pool: &MySqlPool) -> Result<Vec<Contract>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM contract_history WHERE contract_type = ? AND status = ?",
        CONTRACT_COLUMNS
    );
    sqlx::query_as::<_, Contract>(&sql)
        .bind(ContractType::PerDay.to_string())
        .bind(ContractStatus::Active.to_string())
        .fetch_all(pool)
        .await
}

/// Resolves the rate of a pair, limited to contracts covering `on` when given.
pub async fn resolve_daily_rate(
    pool: &MySqlPool,
    worker_id: u64,
    project_id: u64,
    on: Option<NaiveDate>,
) -> Result<RateResolution, sqlx::Error> {
    let contracts = load_per_day_contracts(pool, worker_id, project_id).await?;
    Ok(RateResolution::resolve(&contracts, on))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::contract::per_day;

    #[test]
    fn single_active_contract_is_found() {
        let contracts = vec![per_day(7, Some(30000.0), "active"), per_day(8, Some(25000.0), "finished")];
        assert_eq!(
            RateResolution::resolve(&contracts, None),
            RateResolution::Found {
                contract_id: 7,
                daily_rate: 30000.0
            }
        );
    }

    #[test]
    fn missing_contract_is_not_found() {
        let mut task_contract = per_day(1, None, "active");
        task_contract.contract_type = "per_task".into();
        let resolution = RateResolution::resolve(&[task_contract], None);
        assert_eq!(resolution, RateResolution::NotFound);
        assert_eq!(resolution.rate_or_zero(), 0.0);
        assert_eq!(resolution.require(), Err(PaymentError::RateNotFound));
    }

    #[test]
    fn two_active_contracts_are_ambiguous() {
        let contracts = vec![per_day(1, Some(30000.0), "active"), per_day(2, Some(32000.0), "active")];
        let resolution = RateResolution::resolve(&contracts, None);
        match &resolution {
            RateResolution::Ambiguous { candidates } => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguous, got {:?}", other),
        }
        assert_eq!(resolution.require(), Err(PaymentError::RateAmbiguous(2)));
    }

    #[test]
    fn contract_outside_day_is_ignored() {
        let mut old = per_day(1, Some(20000.0), "active");
        old.end_date = NaiveDate::from_ymd_opt(2025, 1, 31);
        let current = per_day(2, Some(30000.0), "active");
        let day = NaiveDate::from_ymd_opt(2025, 3, 3);
        assert_eq!(
            RateResolution::resolve(&[old, current], day),
            RateResolution::Found {
                contract_id: 2,
                daily_rate: 30000.0
            }
        );
    }

    #[test]
    fn day_before_start_is_not_found() {
        let contracts = vec![per_day(1, Some(30000.0), "active")];
        let before = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert_eq!(RateResolution::resolve(&contracts, before), RateResolution::NotFound);
    }

    #[test]
    fn contracts_are_grouped_by_pair() {
        let mut other = per_day(2, Some(20000.0), "active");
        other.worker_id = 2;
        let grouped = group_by_pair(vec![per_day(1, Some(30000.0), "active"), other]);
        assert_eq!(grouped[&(1, 1)].len(), 1);
        assert_eq!(RateResolution::resolve(&grouped[&(2, 1)], None).rate_or_zero(), 20000.0);
    }
}
