use crate::{
    api::{project::ensure_active_project, worker::fetch_worker},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::attendance::{AttendanceRecord, FULL_DAY_PERCENTAGE, WorkSummary},
    payments::{check_percentage, rate::resolve_daily_rate},
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, worker_id, project_id, contract_id, date, is_present, check_in, check_out, \
     hours_worked, is_overtime, overtime_hours, early_departure, early_departure_reason, payment_percentage, is_paid";

#[derive(Deserialize, ToSchema)]
pub struct MarkAttendance {
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(value_type = String, format = "date", example = "2025-03-03")]
    pub date: NaiveDate,

    pub is_present: bool,

    #[schema(value_type = Option<String>, example = "08:00:00", nullable = true)]
    pub check_in: Option<NaiveTime>,

    #[schema(value_type = Option<String>, example = "18:00:00", nullable = true)]
    pub check_out: Option<NaiveTime>,

    /// Defaults to 100 when omitted.
    #[schema(example = 100.0, nullable = true)]
    pub payment_percentage: Option<f64>,

    #[schema(nullable = true)]
    pub early_departure_reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub project_id: u64,
    #[param(value_type = String)]
    pub start: NaiveDate,
    #[param(value_type = String)]
    pub end: NaiveDate,
    pub worker_id: Option<u64>,
}

impl MarkAttendance {
    fn summary(&self, standard_hours: f64) -> Result<(f64, WorkSummary), AppError> {
        let pct = check_percentage(self.payment_percentage.unwrap_or(FULL_DAY_PERCENTAGE))?;

        if !self.is_present {
            return Ok((pct, WorkSummary::default()));
        }

        let summary = WorkSummary::compute(self.check_in, self.check_out, standard_hours)
            .ok_or_else(|| AppError::Validation("check_out must be after check_in".into()))?;
        Ok((pct, summary))
    }
}

/// Creates or replaces the attendance of a worker on a project for one day.
/// A day that has already been paid is frozen.
#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, body = AttendanceRecord),
        (status = 400, description = "Invalid times or percentage"),
        (status = 404, description = "Worker or project not found"),
        (status = 409, description = "Day already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<MarkAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let (pct, summary) = payload.summary(config.standard_work_hours)?;

    fetch_worker(pool.get_ref(), payload.worker_id).await?;
    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let contract_id = resolve_daily_rate(pool.get_ref(), payload.worker_id, payload.project_id, Some(payload.date))
        .await?
        .require()
        .ok()
        .map(|(id, _)| id);

    let mut tx = pool.begin().await?;

    let paid: Option<bool> = sqlx::query_scalar(
        "SELECT is_paid FROM worker_attendance WHERE worker_id = ? AND project_id = ? AND date = ? FOR UPDATE",
    )
    .bind(payload.worker_id)
    .bind(payload.project_id)
    .bind(payload.date)
    .fetch_optional(&mut *tx)
    .await?;

    if paid == Some(true) {
        return Err(AppError::Conflict(format!(
            "attendance for {} has already been paid",
            payload.date
        )));
    }

    let reason = if summary.early_departure {
        payload.early_departure_reason.as_deref().map(str::trim)
    } else {
        None
    };

    sqlx::query(
        r#"
        INSERT INTO worker_attendance
            (worker_id, project_id, contract_id, date, is_present, check_in, check_out,
             hours_worked, is_overtime, overtime_hours, early_departure, early_departure_reason, payment_percentage)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            contract_id = VALUES(contract_id),
            is_present = VALUES(is_present),
            check_in = VALUES(check_in),
            check_out = VALUES(check_out),
            hours_worked = VALUES(hours_worked),
            is_overtime = VALUES(is_overtime),
            overtime_hours = VALUES(overtime_hours),
            early_departure = VALUES(early_departure),
            early_departure_reason = VALUES(early_departure_reason),
            payment_percentage = VALUES(payment_percentage)
        "#,
    )
    .bind(payload.worker_id)
    .bind(payload.project_id)
    .bind(contract_id)
    .bind(payload.date)
    .bind(payload.is_present)
    .bind(payload.check_in.filter(|_| payload.is_present))
    .bind(payload.check_out.filter(|_| payload.is_present))
    .bind(summary.hours_worked)
    .bind(summary.is_overtime)
    .bind(summary.overtime_hours)
    .bind(summary.early_departure)
    .bind(reason)
    .bind(pct)
    .execute(&mut *tx)
    .await?;

    let sql = format!(
        "SELECT {} FROM worker_attendance WHERE worker_id = ? AND project_id = ? AND date = ?",
        ATTENDANCE_COLUMNS
    );
    let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(payload.worker_id)
        .bind(payload.project_id)
        .bind(payload.date)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        worker_id = payload.worker_id,
        project_id = payload.project_id,
        date = %payload.date,
        present = payload.is_present,
        "Attendance marked"
    );
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, body = [AttendanceRecord]),
        (status = 400, description = "Invalid range")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    if query.start > query.end {
        return Err(AppError::Validation("start must not be after end".into()));
    }

    let mut qb = sqlx::QueryBuilder::<sqlx::MySql>::new(format!(
        "SELECT {} FROM worker_attendance WHERE project_id = ",
        ATTENDANCE_COLUMNS
    ));
    qb.push_bind(query.project_id)
        .push(" AND date BETWEEN ")
        .push_bind(query.start)
        .push(" AND ")
        .push_bind(query.end);
    if let Some(worker_id) = query.worker_id {
        qb.push(" AND worker_id = ").push_bind(worker_id);
    }
    qb.push(" ORDER BY date, worker_id");

    let rows = qb
        .build_query_as::<AttendanceRecord>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, lazy_pool, test_config};
    use actix_web::{
        App,
        http::StatusCode,
        test::{TestRequest, call_service, init_service},
    };
    use serde_json::json;

    #[actix_web::test]
    async fn percentage_outside_range_is_rejected() {
        let app = init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(lazy_pool()))
                .route("/attendance", web::put().to(mark_attendance)),
        )
        .await;

        let req = TestRequest::put()
            .uri("/attendance")
            .insert_header(("Authorization", bearer(2)))
            .set_json(json!({
                "worker_id": 1, "project_id": 1, "date": "2025-03-03",
                "is_present": true, "payment_percentage": 120.0
            }))
            .to_request();

        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn check_out_must_follow_check_in() {
        let mark = MarkAttendance {
            worker_id: 1,
            project_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            is_present: true,
            check_in: NaiveTime::from_hms_opt(18, 0, 0),
            check_out: NaiveTime::from_hms_opt(8, 0, 0),
            payment_percentage: None,
            early_departure_reason: None,
        };
        assert!(mark.summary(9.0).is_err());
    }

    #[test]
    fn absent_day_keeps_percentage_and_derives_nothing() {
        let mark = MarkAttendance {
            worker_id: 1,
            project_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            is_present: false,
            check_in: None,
            check_out: None,
            payment_percentage: Some(50.0),
            early_departure_reason: None,
        };
        let (pct, summary) = mark.summary(9.0).unwrap();
        assert_eq!(pct, 50.0);
        assert_eq!(summary, WorkSummary::default());
    }
}
