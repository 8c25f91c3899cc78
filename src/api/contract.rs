use crate::{
    api::{project::ensure_active_project, worker::fetch_worker},
    auth::auth::AuthUser,
    error::AppError,
    model::contract::{Contract, ContractStatus, ContractType},
    payments::rate::{RateResolution, resolve_daily_rate},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const CONTRACT_COLUMNS: &str = "id, worker_id, project_id, contract_type, status, start_date, end_date, daily_rate";

#[derive(Deserialize, ToSchema)]
pub struct CreateContract {
    pub worker_id: u64,
    pub project_id: u64,
    pub contract_type: ContractType,

    #[schema(value_type = String, format = "date", example = "2025-03-01")]
    pub start_date: NaiveDate,

    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub end_date: Option<NaiveDate>,

    /// Required and positive for `per_day` contracts.
    #[schema(example = 30000.0, nullable = true)]
    pub daily_rate: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeContractStatus {
    /// `finished` or `cancelled`
    pub status: ContractStatus,
}

#[derive(Deserialize, IntoParams)]
pub struct RateQuery {
    pub worker_id: u64,
    pub project_id: u64,
    /// Only contracts covering this day; any active one when omitted.
    #[param(value_type = Option<String>)]
    pub on: Option<NaiveDate>,
}

impl CreateContract {
    fn validate(&self) -> Result<Option<f64>, AppError> {
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(AppError::Validation("end_date must not be before start_date".into()));
            }
        }

        match self.contract_type {
            ContractType::PerDay => match self.daily_rate {
                Some(rate) if rate.is_finite() && rate > 0.0 => Ok(Some(rate)),
                _ => Err(AppError::Validation(
                    "per_day contracts need a positive daily_rate".into(),
                )),
            },
            ContractType::PerTask => Ok(None),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/contracts",
    request_body = CreateContract,
    responses(
        (status = 201, body = Contract),
        (status = 400, description = "Invalid contract"),
        (status = 404, description = "Worker or project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn create_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateContract>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let daily_rate = payload.validate()?;

    fetch_worker(pool.get_ref(), payload.worker_id).await?;
    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO contract_history (worker_id, project_id, contract_type, status, start_date, end_date, daily_rate)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.worker_id)
    .bind(payload.project_id)
    .bind(payload.contract_type.to_string())
    .bind(ContractStatus::Active.to_string())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(daily_rate)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    // An overlapping active per-day contract makes the rate ambiguous until one is closed
    if payload.contract_type == ContractType::PerDay {
        let resolution =
            resolve_daily_rate(pool.get_ref(), payload.worker_id, payload.project_id, Some(payload.start_date))
                .await?;
        if let RateResolution::Ambiguous { candidates } = resolution {
            tracing::warn!(
                worker_id = payload.worker_id,
                project_id = payload.project_id,
                candidates = candidates.len(),
                "Worker now has overlapping active per-day contracts"
            );
        }
    }

    info!(contract_id = id, worker_id = payload.worker_id, "Contract created");

    let contract = fetch_contract(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(contract))
}

async fn fetch_contract(pool: &MySqlPool, id: u64) -> Result<Contract, AppError> {
    let sql = format!("SELECT {} FROM contract_history WHERE id = ?", CONTRACT_COLUMNS);
    sqlx::query_as::<_, Contract>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Contract"))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}/contracts",
    params(("worker_id", Path, description = "Worker ID")),
    responses((status = 200, body = [Contract])),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn list_worker_contracts(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM contract_history WHERE worker_id = ? ORDER BY start_date DESC, id DESC",
        CONTRACT_COLUMNS
    );
    let contracts = sqlx::query_as::<_, Contract>(&sql)
        .bind(path.into_inner())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(contracts))
}

/// Closes an active contract. Only `active` contracts move, and only to
/// `finished` or `cancelled`.
#[utoipa::path(
    put,
    path = "/api/contracts/{contract_id}/status",
    params(("contract_id", Path, description = "Contract ID")),
    request_body = ChangeContractStatus,
    responses(
        (status = 200, body = Contract),
        (status = 400, description = "Invalid transition"),
        (status = 404, description = "Contract not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn change_contract_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ChangeContractStatus>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let contract_id = path.into_inner();

    if payload.status == ContractStatus::Active {
        return Err(AppError::Validation("a closed contract cannot be reopened".into()));
    }

    let current = fetch_contract(pool.get_ref(), contract_id).await?;
    if current.state()? != ContractStatus::Active {
        return Err(AppError::Validation(format!(
            "contract is already {}",
            current.status
        )));
    }

    sqlx::query(
        "UPDATE contract_history SET status = ?, end_date = COALESCE(end_date, CURDATE()) WHERE id = ? AND status = ?",
    )
    .bind(payload.status.to_string())
    .bind(contract_id)
    .bind(ContractStatus::Active.to_string())
    .execute(pool.get_ref())
    .await?;

    info!(contract_id, status = %payload.status, "Contract closed");

    let contract = fetch_contract(pool.get_ref(), contract_id).await?;
    Ok(HttpResponse::Ok().json(contract))
}

/// Resolves the daily rate of a worker on a project.
#[utoipa::path(
    get,
    path = "/api/contracts/rate",
    params(RateQuery),
    responses(
        (status = 200, description = "found, not_found or ambiguous", body = Object, example = json!({
            "status": "found", "contract_id": 7, "daily_rate": 30000.0
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Contracts"
)]
pub async fn resolve_rate(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RateQuery>,
) -> Result<HttpResponse, AppError> {
    let resolution = resolve_daily_rate(pool.get_ref(), query.worker_id, query.project_id, query.on).await?;
    Ok(HttpResponse::Ok().json(resolution))
}
