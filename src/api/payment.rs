use crate::{
    api::{PageQuery, project::ensure_active_project},
    auth::auth::AuthUser,
    error::AppError,
    model::{
        attendance::AttendanceRecord,
        lifecycle::Lifecycle,
        payment::{PaymentHistoryRecord, PaymentType},
        task::{AssignmentStatus, TaskStatus},
    },
    payments::{
        PaymentError,
        aggregator::{aggregate, load_pending_days, load_pending_tasks},
        day_payment::DayPaymentQuote,
        ensure_all_flipped,
        rate::{group_by_pair, load_all_active_per_day, load_per_day_contracts},
        round2,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, worker_id, project_id, contract_id, date, is_present, check_in, check_out, \
     hours_worked, is_overtime, overtime_hours, early_departure, early_departure_reason, payment_percentage, is_paid";
const HISTORY_COLUMNS: &str = "id, worker_id, project_id, payment_type, amount, period_start, period_end, \
     days_count, task_id, tasks_count, notes, processed_by, created_at";

#[derive(Debug, Deserialize, IntoParams)]
pub struct DayQuoteQuery {
    pub worker_id: u64,
    pub project_id: u64,
    #[param(value_type = String)]
    pub start: NaiveDate,
    #[param(value_type = String)]
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DayPaymentRequest {
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(value_type = String, format = "date", example = "2025-03-01")]
    pub start: NaiveDate,

    #[schema(value_type = String, format = "date", example = "2025-03-31")]
    pub end: NaiveDate,

    #[serde(default)]
    #[schema(nullable = true)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskPaymentRequest {
    pub worker_id: u64,
    pub project_id: u64,
    /// Restrict the payment to these tasks; all pending tasks when omitted.
    #[serde(default)]
    pub task_ids: Option<Vec<u64>>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomPaymentRequest {
    pub worker_id: u64,
    pub project_id: u64,
    #[schema(example = 15000.0)]
    pub amount: f64,
    #[schema(example = "Bono de cierre")]
    pub notes: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PendingQuery {
    pub project_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub worker_id: Option<u64>,
    pub project_id: Option<u64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub data: Vec<PaymentHistoryRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// One row of a processed payment batch, before it is written.
struct NewPayment<'a> {
    worker_id: u64,
    project_id: u64,
    payment_type: PaymentType,
    amount: f64,
    period: Option<(NaiveDate, NaiveDate)>,
    days_count: Option<i32>,
    task_id: Option<u64>,
    tasks_count: Option<i32>,
    notes: Option<&'a str>,
    processed_by: u64,
}

async fn insert_history(tx: &mut Transaction<'_, MySql>, p: NewPayment<'_>) -> Result<u64, AppError> {
    let id = sqlx::query(
        r#"
        INSERT INTO worker_payment_history
            (worker_id, project_id, payment_type, amount, period_start, period_end,
             days_count, task_id, tasks_count, notes, processed_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(p.worker_id)
    .bind(p.project_id)
    .bind(p.payment_type.to_string())
    .bind(p.amount)
    .bind(p.period.map(|(start, _)| start))
    .bind(p.period.map(|(_, end)| end))
    .bind(p.days_count)
    .bind(p.task_id)
    .bind(p.tasks_count)
    .bind(p.notes)
    .bind(p.processed_by)
    .execute(&mut **tx)
    .await?
    .last_insert_id();

    Ok(id)
}

/// Adds a signed `delta` to the project's spent-on-payments total.
async fn adjust_spent(tx: &mut Transaction<'_, MySql>, project_id: u64, delta: f64) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO income_tracking (project_id, total_spent_on_payments) VALUES (?, ?)
        ON DUPLICATE KEY UPDATE total_spent_on_payments = total_spent_on_payments + VALUES(total_spent_on_payments)
        "#,
    )
    .bind(project_id)
    .bind(delta)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_history(pool: &MySqlPool, id: u64) -> Result<PaymentHistoryRecord, AppError> {
    let sql = format!("SELECT {} FROM worker_payment_history WHERE id = ?", HISTORY_COLUMNS);
    sqlx::query_as::<_, PaymentHistoryRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Payment"))
}

/// Flips `is_paid` on exactly `ids` in `table`. Any row already paid by a
/// concurrent request aborts the batch.
async fn mark_paid(tx: &mut Transaction<'_, MySql>, table: &str, ids: &[u64]) -> Result<(), AppError> {
    let mut qb = QueryBuilder::<MySql>::new(format!("UPDATE {} SET is_paid = TRUE WHERE is_paid = FALSE AND id IN (", table));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let affected = qb.build().execute(&mut **tx).await?.rows_affected();
    ensure_all_flipped(ids.len(), affected)?;
    Ok(())
}

async fn load_unpaid_days(
    conn: &mut sqlx::MySqlConnection,
    (worker_id, project_id): (u64, u64),
    (start, end): (NaiveDate, NaiveDate),
    lock: bool,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM worker_attendance \
         WHERE worker_id = ? AND project_id = ? AND date BETWEEN ? AND ? \
         AND is_present = TRUE AND is_paid = FALSE ORDER BY date{}",
        ATTENDANCE_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(worker_id)
        .bind(project_id)
        .bind(start)
        .bind(end)
        .fetch_all(conn)
        .await
}

/// Locks the unpaid present days of the request, prices each with the contract
/// covering it, flips them to paid, writes one history record and books the
/// amount against the project.
async fn pay_days(
    tx: &mut Transaction<'_, MySql>,
    request: &DayPaymentRequest,
    processed_by: u64,
) -> Result<(u64, DayPaymentQuote), AppError> {
    let contracts = load_per_day_contracts(&mut **tx, request.worker_id, request.project_id).await?;
    let rows = load_unpaid_days(
        &mut **tx,
        (request.worker_id, request.project_id),
        (request.start, request.end),
        true,
    )
    .await?;

    let quote = DayPaymentQuote::build(
        request.worker_id,
        request.project_id,
        request.start,
        request.end,
        &rows,
        &contracts,
    )?;
    quote.ensure_payable()?;

    let amount = round2(quote.total);
    mark_paid(tx, "worker_attendance", &quote.attendance_ids()).await?;

    let history_id = insert_history(
        tx,
        NewPayment {
            worker_id: request.worker_id,
            project_id: request.project_id,
            payment_type: PaymentType::PorDia,
            amount,
            period: Some((request.start, request.end)),
            days_count: Some(quote.days_count as i32),
            task_id: None,
            tasks_count: None,
            notes: request.notes.as_deref(),
            processed_by,
        },
    )
    .await?;

    adjust_spent(tx, request.project_id, amount).await?;
    Ok((history_id, quote))
}

/// Prices the unpaid present days of a worker on a project. A day without a
/// single covering per-day contract is priced at 0 and reported in its `rate`.
#[utoipa::path(
    get,
    path = "/api/payments/day/quote",
    params(DayQuoteQuery),
    responses(
        (status = 200, body = DayPaymentQuote),
        (status = 400, description = "Invalid range")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn quote_day_payment(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuoteQuery>,
) -> Result<HttpResponse, AppError> {
    if query.start > query.end {
        return Err(PaymentError::InvalidRange(query.start, query.end).into());
    }

    let contracts = load_per_day_contracts(pool.get_ref(), query.worker_id, query.project_id).await?;

    let mut conn = pool.acquire().await?;
    let rows = load_unpaid_days(
        &mut *conn,
        (query.worker_id, query.project_id),
        (query.start, query.end),
        false,
    )
    .await?;

    let quote = DayPaymentQuote::build(query.worker_id, query.project_id, query.start, query.end, &rows, &contracts)?;
    Ok(HttpResponse::Ok().json(quote))
}

/// Pays every unpaid present day in the range. Either all selected days flip
/// to paid and one history record is written, or nothing changes.
#[utoipa::path(
    post,
    path = "/api/payments/day",
    request_body = DayPaymentRequest,
    responses(
        (status = 201, body = PaymentHistoryRecord),
        (status = 400, description = "Invalid range, rate not resolved or nothing to pay"),
        (status = 409, description = "Days were paid concurrently")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, worker_id = payload.worker_id, project_id = payload.project_id))]
pub async fn process_day_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DayPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_payments()?;
    if payload.start > payload.end {
        return Err(PaymentError::InvalidRange(payload.start, payload.end).into());
    }

    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let mut tx = pool.begin().await?;
    let (history_id, quote) = pay_days(&mut tx, &payload, auth.user_id).await?;
    tx.commit().await?;

    info!(history_id, amount = round2(quote.total), days = quote.days_count, "Day payment processed");

    let record = fetch_history(pool.get_ref(), history_id).await?;
    Ok(HttpResponse::Created().json(record))
}

#[derive(sqlx::FromRow)]
struct PayableAssignment {
    id: u64,
    task_id: u64,
    worker_payment: f64,
}

/// Pays a worker's pending piece-rate assignments on a project: completed
/// active tasks, active unpaid `a_trato` assignments with a non-negative
/// amount.
#[utoipa::path(
    post,
    path = "/api/payments/task",
    request_body = TaskPaymentRequest,
    responses(
        (status = 201, body = PaymentHistoryRecord),
        (status = 400, description = "Nothing to pay"),
        (status = 409, description = "Assignments were paid concurrently")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, worker_id = payload.worker_id, project_id = payload.project_id))]
pub async fn process_task_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<TaskPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_payments()?;
    if payload.task_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
        return Err(PaymentError::NothingToPay.into());
    }
    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let mut tx = pool.begin().await?;

    let mut qb = QueryBuilder::<MySql>::new(
        r#"
        SELECT ta.id, ta.task_id, ta.worker_payment
        FROM task_assignments ta
        JOIN tasks t ON t.id = ta.task_id
        JOIN apartments a ON a.id = t.apartment_id
        JOIN floors f ON f.id = a.floor_id
        JOIN towers tw ON tw.id = f.tower_id
        JOIN projects p ON p.id = tw.project_id
        WHERE ta.is_paid = FALSE AND ta.worker_payment >= 0
        "#,
    );
    qb.push(" AND ta.worker_id = ").push_bind(payload.worker_id);
    qb.push(" AND p.id = ").push_bind(payload.project_id);
    qb.push(" AND p.lifecycle = ").push_bind(Lifecycle::Active.to_string());
    qb.push(" AND t.lifecycle = ").push_bind(Lifecycle::Active.to_string());
    qb.push(" AND t.status = ").push_bind(TaskStatus::Completed.to_string());
    qb.push(" AND ta.assignment_status = ").push_bind(AssignmentStatus::Active.to_string());
    qb.push(" AND ta.contract_type = ").push_bind(PaymentType::ATrato.to_string());
    if let Some(task_ids) = &payload.task_ids {
        qb.push(" AND ta.task_id IN (");
        let mut separated = qb.separated(", ");
        for id in task_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
    }
    qb.push(" ORDER BY ta.id FOR UPDATE");

    let rows = qb
        .build_query_as::<PayableAssignment>()
        .fetch_all(&mut *tx)
        .await?;

    if rows.is_empty() {
        return Err(PaymentError::NothingToPay.into());
    }

    let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
    let amount = round2(rows.iter().map(|r| r.worker_payment).sum());
    let single_task = match rows.as_slice() {
        [first, rest @ ..] if rest.iter().all(|r| r.task_id == first.task_id) => Some(first.task_id),
        _ => None,
    };

    mark_paid(&mut tx, "task_assignments", &ids).await?;

    let history_id = insert_history(
        &mut tx,
        NewPayment {
            worker_id: payload.worker_id,
            project_id: payload.project_id,
            payment_type: PaymentType::ATrato,
            amount,
            period: None,
            days_count: None,
            task_id: single_task,
            tasks_count: Some(rows.len() as i32),
            notes: payload.notes.as_deref(),
            processed_by: auth.user_id,
        },
    )
    .await?;

    adjust_spent(&mut tx, payload.project_id, amount).await?;
    tx.commit().await?;

    info!(history_id, amount, tasks = rows.len(), "Task payment processed");

    let record = fetch_history(pool.get_ref(), history_id).await?;
    Ok(HttpResponse::Created().json(record))
}

/// Records a one-off payment that is not backed by attendance or tasks.
#[utoipa::path(
    post,
    path = "/api/payments/custom",
    request_body = CustomPaymentRequest,
    responses(
        (status = 201, body = PaymentHistoryRecord),
        (status = 400, description = "Invalid amount or missing notes")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, worker_id = payload.worker_id, project_id = payload.project_id))]
pub async fn record_custom_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CustomPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_payments()?;

    if !payload.amount.is_finite() || payload.amount <= 0.0 {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    let notes = payload.notes.trim();
    if notes.is_empty() {
        return Err(AppError::Validation("notes are required for custom payments".into()));
    }
    ensure_active_project(pool.get_ref(), payload.project_id).await?;

    let amount = round2(payload.amount);
    let mut tx = pool.begin().await?;
    let history_id = insert_history(
        &mut tx,
        NewPayment {
            worker_id: payload.worker_id,
            project_id: payload.project_id,
            payment_type: PaymentType::Custom,
            amount,
            period: None,
            days_count: None,
            task_id: None,
            tasks_count: None,
            notes: Some(notes),
            processed_by: auth.user_id,
        },
    )
    .await?;
    adjust_spent(&mut tx, payload.project_id, amount).await?;
    tx.commit().await?;

    info!(history_id, amount, "Custom payment recorded");

    let record = fetch_history(pool.get_ref(), history_id).await?;
    Ok(HttpResponse::Created().json(record))
}

/// Pending task and day amounts per project and worker.
#[utoipa::path(
    get,
    path = "/api/payments/pending",
    params(PendingQuery),
    responses((status = 200, body = crate::payments::aggregator::PendingSummary)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
#[instrument(skip_all)]
pub async fn pending_summary(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PendingQuery>,
) -> Result<HttpResponse, AppError> {
    let tasks = load_pending_tasks(pool.get_ref(), query.project_id).await?;
    let days = load_pending_days(pool.get_ref(), query.project_id).await?;
    let contracts = group_by_pair(load_all_active_per_day(pool.get_ref()).await?);

    let summary = aggregate(&tasks, &days, &contracts);
    tracing::debug!(
        projects = summary.projects.len(),
        total = summary.total_pending,
        "Pending summary computed"
    );
    Ok(HttpResponse::Ok().json(summary))
}

fn push_history_filters(qb: &mut QueryBuilder<'_, MySql>, query: &HistoryQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(worker_id) = query.worker_id {
        qb.push(" AND worker_id = ").push_bind(worker_id);
    }
    if let Some(project_id) = query.project_id {
        qb.push(" AND project_id = ").push_bind(project_id);
    }
}

#[utoipa::path(
    get,
    path = "/api/payments/history",
    params(HistoryQuery),
    responses((status = 200, body = HistoryResponse)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_history(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve();

    let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM worker_payment_history");
    push_history_filters(&mut count_qb, &query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data_qb = QueryBuilder::<MySql>::new(format!("SELECT {} FROM worker_payment_history", HISTORY_COLUMNS));
    push_history_filters(&mut data_qb, &query);
    data_qb
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset as i64);
    let data = data_qb
        .build_query_as::<PaymentHistoryRecord>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, lazy_pool, live_pool, test_config};
    use crate::utils::rut::check_digit;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;

    fn d(day_of_month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day_of_month).unwrap()
    }

    /// Worker, project and a 30000 per-day contract from March 1st, plus a
    /// full day on the 3rd and a half day on the 4th.
    async fn seed_days(tx: &mut Transaction<'_, MySql>) -> (u64, u64) {
        let body = (uuid::Uuid::new_v4().as_u128() % 80_000_000) as u32 + 10_000_000;
        let rut = format!("{}-{}", body, check_digit(body));

        let worker_id = sqlx::query("INSERT INTO workers (rut, full_name, role) VALUES (?, 'Pedro Soto', 'albanil')")
            .bind(&rut)
            .execute(&mut **tx)
            .await
            .unwrap()
            .last_insert_id();
        let project_id = sqlx::query("INSERT INTO projects (name) VALUES ('Edificio Mirador')")
            .execute(&mut **tx)
            .await
            .unwrap()
            .last_insert_id();
        sqlx::query(
            "INSERT INTO contract_history (worker_id, project_id, contract_type, status, start_date, daily_rate) \
             VALUES (?, ?, 'per_day', 'active', ?, 30000)",
        )
        .bind(worker_id)
        .bind(project_id)
        .bind(d(1))
        .execute(&mut **tx)
        .await
        .unwrap();

        for (date, pct) in [(d(3), 100.0), (d(4), 50.0)] {
            sqlx::query(
                "INSERT INTO worker_attendance (worker_id, project_id, date, is_present, payment_percentage) \
                 VALUES (?, ?, ?, TRUE, ?)",
            )
            .bind(worker_id)
            .bind(project_id)
            .bind(date)
            .bind(pct)
            .execute(&mut **tx)
            .await
            .unwrap();
        }

        (worker_id, project_id)
    }

    fn march(worker_id: u64, project_id: u64) -> DayPaymentRequest {
        DayPaymentRequest {
            worker_id,
            project_id,
            start: d(1),
            end: d(31),
            notes: None,
        }
    }

    #[actix_web::test]
    async fn day_payment_flips_every_day_and_writes_one_record() {
        let Some(pool) = live_pool().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let (worker_id, project_id) = seed_days(&mut tx).await;

        let (history_id, quote) = pay_days(&mut tx, &march(worker_id, project_id), 1).await.unwrap();
        assert_eq!(quote.total, 45000.0);
        assert_eq!(quote.days_count, 2);

        let unpaid: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM worker_attendance WHERE worker_id = ? AND is_paid = FALSE")
                .bind(worker_id)
                .fetch_one(&mut *tx)
                .await
                .unwrap();
        assert_eq!(unpaid, 0);

        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM worker_payment_history WHERE worker_id = ?")
            .bind(worker_id)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(records, 1);

        let amount: f64 = sqlx::query_scalar("SELECT amount FROM worker_payment_history WHERE id = ?")
            .bind(history_id)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(amount, 45000.0);

        let spent: f64 = sqlx::query_scalar("SELECT total_spent_on_payments FROM income_tracking WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(spent, 45000.0);

        tx.rollback().await.unwrap();
    }

    #[actix_web::test]
    async fn paid_days_cannot_be_flipped_or_paid_again() {
        let Some(pool) = live_pool().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let (worker_id, project_id) = seed_days(&mut tx).await;

        let (_, quote) = pay_days(&mut tx, &march(worker_id, project_id), 1).await.unwrap();

        let again = mark_paid(&mut tx, "worker_attendance", &quote.attendance_ids()).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let second = pay_days(&mut tx, &march(worker_id, project_id), 1).await;
        assert!(matches!(second, Err(AppError::Validation(_))));

        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM worker_payment_history WHERE worker_id = ?")
            .bind(worker_id)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(records, 1);

        tx.rollback().await.unwrap();
    }

    async fn call(path: &str, role: u8, body: serde_json::Value) -> StatusCode {
        call_with(lazy_pool(), path, role, body).await
    }

    async fn call_with(pool: MySqlPool, path: &str, role: u8, body: serde_json::Value) -> StatusCode {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(pool))
                .route("/payments/day", web::post().to(process_day_payment))
                .route("/payments/task", web::post().to(process_task_payment))
                .route("/payments/custom", web::post().to(record_custom_payment)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(path)
            .insert_header(("Authorization", bearer(role)))
            .set_json(body)
            .to_request();
        test::call_service(&app, req).await.status()
    }

    #[actix_web::test]
    async fn site_manager_cannot_process_payments() {
        let body = json!({ "worker_id": 1, "project_id": 1, "start": "2025-03-01", "end": "2025-03-31" });
        assert_eq!(call("/payments/day", 2, body).await, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn inverted_range_is_rejected() {
        let body = json!({ "worker_id": 1, "project_id": 1, "start": "2025-03-31", "end": "2025-03-01" });
        assert_eq!(call("/payments/day", 3, body).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn empty_task_selection_is_rejected() {
        let body = json!({ "worker_id": 1, "project_id": 1, "task_ids": [] });
        assert_eq!(call("/payments/task", 1, body).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn custom_payment_needs_positive_amount_and_notes() {
        let body = json!({ "worker_id": 1, "project_id": 1, "amount": -5.0, "notes": "x" });
        assert_eq!(call("/payments/custom", 3, body).await, StatusCode::BAD_REQUEST);

        let body = json!({ "worker_id": 1, "project_id": 1, "amount": 5000.0, "notes": "  " });
        assert_eq!(call("/payments/custom", 3, body).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn archived_project_cannot_be_paid() {
        let Some(pool) = live_pool().await else {
            return;
        };
        let project_id = sqlx::query("INSERT INTO projects (name, lifecycle) VALUES ('Condominio Cerrado', 'archived')")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_id();

        let day = json!({ "worker_id": 1, "project_id": project_id, "start": "2025-03-01", "end": "2025-03-31" });
        let task = json!({ "worker_id": 1, "project_id": project_id });
        let custom = json!({ "worker_id": 1, "project_id": project_id, "amount": 5000.0, "notes": "bono" });
        let statuses = [
            call_with(pool.clone(), "/payments/day", 3, day).await,
            call_with(pool.clone(), "/payments/task", 3, task).await,
            call_with(pool.clone(), "/payments/custom", 3, custom).await,
        ];

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(statuses, [StatusCode::NOT_FOUND; 3]);
    }
}
