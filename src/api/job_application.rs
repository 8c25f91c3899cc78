use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{
        job_application::{ApplicationStatus, JobApplication},
        parse_column,
    },
    utils::rut::Rut,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const APPLICATION_COLUMNS: &str = "id, full_name, rut, phone, email, trade, years_experience, status, created_at";

#[derive(Deserialize, ToSchema)]
pub struct SubmitApplication {
    pub full_name: String,
    #[schema(example = "9.876.543-3")]
    pub rut: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[schema(example = "carpintero")]
    pub trade: String,
    #[serde(default)]
    pub years_experience: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeApplicationStatus {
    pub status: ApplicationStatus,
}

#[derive(Deserialize, IntoParams)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
}

impl SubmitApplication {
    fn validate(&self) -> Result<Rut, AppError> {
        if self.full_name.trim().is_empty() || self.trade.trim().is_empty() {
            return Err(AppError::Validation("full_name and trade are required".into()));
        }
        if self.years_experience < 0 {
            return Err(AppError::Validation("years_experience must not be negative".into()));
        }
        if let Some(email) = self.email.as_deref() {
            if !email.contains('@') {
                return Err(AppError::Validation("email is not valid".into()));
            }
        }
        Ok(self.rut.parse::<Rut>()?)
    }
}

/// Public intake form; no token required.
#[utoipa::path(
    post,
    path = "/applications",
    request_body = SubmitApplication,
    responses(
        (status = 201, body = JobApplication),
        (status = 400, description = "Invalid application")
    ),
    tag = "Job applications"
)]
pub async fn submit_application(
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitApplication>,
) -> Result<HttpResponse, AppError> {
    let rut = payload.validate()?;

    let id = sqlx::query(
        "INSERT INTO job_applications (full_name, rut, phone, email, trade, years_experience, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.full_name.trim())
    .bind(rut.to_string())
    .bind(payload.phone.as_deref())
    .bind(payload.email.as_deref())
    .bind(payload.trade.trim())
    .bind(payload.years_experience)
    .bind(ApplicationStatus::Received.to_string())
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(application_id = id, "Job application received");

    let application = fetch_application(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(application))
}

async fn fetch_application(pool: &MySqlPool, id: u64) -> Result<JobApplication, AppError> {
    let sql = format!("SELECT {} FROM job_applications WHERE id = ?", APPLICATION_COLUMNS);
    sqlx::query_as::<_, JobApplication>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Job application"))
}

#[utoipa::path(
    get,
    path = "/api/applications",
    params(ApplicationQuery),
    responses((status = 200, body = [JobApplication])),
    security(("bearer_auth" = [])),
    tag = "Job applications"
)]
pub async fn list_applications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ApplicationQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let mut qb = sqlx::QueryBuilder::<sqlx::MySql>::new(format!(
        "SELECT {} FROM job_applications",
        APPLICATION_COLUMNS
    ));
    if let Some(status) = query.status {
        qb.push(" WHERE status = ").push_bind(status.to_string());
    }
    qb.push(" ORDER BY created_at DESC, id DESC");

    let rows = qb
        .build_query_as::<JobApplication>()
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    put,
    path = "/api/applications/{application_id}/status",
    params(("application_id", Path, description = "Application ID")),
    request_body = ChangeApplicationStatus,
    responses(
        (status = 200, body = JobApplication),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Job applications"
)]
pub async fn update_application_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ChangeApplicationStatus>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let id = path.into_inner();

    let current = fetch_application(pool.get_ref(), id).await?;
    let from: ApplicationStatus = parse_column(&current.status, "status")?;
    if !from.can_move_to(payload.status) {
        return Err(AppError::Validation(format!(
            "application cannot move from {} to {}",
            from, payload.status
        )));
    }

    let result = sqlx::query("UPDATE job_applications SET status = ? WHERE id = ? AND status = ?")
        .bind(payload.status.to_string())
        .bind(id)
        .bind(from.to_string())
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("application changed concurrently".into()));
    }

    info!(application_id = id, from = %from, to = %payload.status, "Application status changed");

    let application = fetch_application(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(application))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(rut: &str, years: i32) -> SubmitApplication {
        SubmitApplication {
            full_name: "Pedro Soto".into(),
            rut: rut.into(),
            phone: None,
            email: Some("pedro@example.com".into()),
            trade: "gasfiter".into(),
            years_experience: years,
        }
    }

    #[test]
    fn valid_form_normalises_rut() {
        let rut = form("9.876.543-3", 4).validate().unwrap();
        assert_eq!(rut.to_string(), "9876543-3");
    }

    #[test]
    fn bad_check_digit_is_rejected() {
        assert!(form("9.876.543-4", 4).validate().is_err());
    }

    #[test]
    fn negative_experience_is_rejected() {
        assert!(form("9.876.543-3", -1).validate().is_err());
    }
}
