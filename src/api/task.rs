use crate::{
    api::{project::ensure_active_apartment, worker::fetch_worker},
    auth::auth::AuthUser,
    error::AppError,
    model::{
        lifecycle::Lifecycle,
        payment::PaymentType,
        task::{AssignmentStatus, Task, TaskAssignment, TaskPriority, TaskStatus},
    },
    payments::{
        distribution::{Distribution, ProposedShare, Share, SharePayment, validate_proposal},
        round2, share_of,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, instrument};
use utoipa::ToSchema;

const TASK_COLUMNS: &str = "id, apartment_id, name, status, priority, total_budget, lifecycle";
const ASSIGNMENT_COLUMNS: &str =
    "id, task_id, worker_id, percentage, worker_payment, contract_type, assignment_status, is_paid";

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    pub apartment_id: u64,
    #[schema(example = "Tabiquería")]
    pub name: String,
    #[schema(example = 100000.0)]
    pub total_budget: f64,
    pub priority: Option<TaskPriority>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeTaskStatus {
    pub status: TaskStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignWorker {
    pub worker_id: u64,
    /// `a_trato` (default) or `por_dia`
    pub contract_type: Option<PaymentType>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustDistribution {
    pub shares: Vec<ProposedShare>,
}

#[derive(Serialize, ToSchema)]
pub struct DistributionResponse {
    pub task_id: u64,
    pub total_budget: f64,
    pub shares: Vec<SharePayment>,
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, body = Task),
        (status = 400, description = "Invalid task"),
        (status = 404, description = "Apartment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTask>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if !payload.total_budget.is_finite() || payload.total_budget < 0.0 {
        return Err(AppError::Validation("total_budget must be zero or positive".into()));
    }
    ensure_active_apartment(pool.get_ref(), payload.apartment_id).await?;

    let id = sqlx::query(
        "INSERT INTO tasks (apartment_id, name, status, priority, total_budget) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.apartment_id)
    .bind(name)
    .bind(TaskStatus::Pending.to_string())
    .bind(payload.priority.unwrap_or(TaskPriority::Medium).to_string())
    .bind(payload.total_budget)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(task_id = id, apartment_id = payload.apartment_id, "Task created");

    let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(task))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}/status",
    params(("task_id", Path, description = "Task ID")),
    request_body = ChangeTaskStatus,
    responses(
        (status = 204, description = "Status updated"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ChangeTaskStatus>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let task_id = path.into_inner();

    let result = sqlx::query("UPDATE tasks SET status = ? WHERE id = ? AND lifecycle = ?")
        .bind(payload.status.to_string())
        .bind(task_id)
        .bind(Lifecycle::Active.to_string())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        // 0 rows also when the status was already set
        let found: Option<u64> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ? AND lifecycle = ?")
            .bind(task_id)
            .bind(Lifecycle::Active.to_string())
            .fetch_optional(pool.get_ref())
            .await?;
        if found.is_none() {
            return Err(AppError::NotFound("Task"));
        }
    }

    info!(task_id, status = %payload.status, "Task status updated");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}/assignments",
    params(("task_id", Path, description = "Task ID")),
    responses((status = 200, body = [TaskAssignment])),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_assignments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM task_assignments WHERE task_id = ? ORDER BY id",
        ASSIGNMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, TaskAssignment>(&sql)
        .bind(path.into_inner())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Locks the task row and loads its active assignments. Holding the task lock
/// serialises every distribution change of the task.
async fn lock_distribution(
    tx: &mut Transaction<'_, MySql>,
    task_id: u64,
) -> Result<(Task, Distribution), AppError> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ? FOR UPDATE", TASK_COLUMNS);
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("Task"))?;

    if !task.lifecycle.parse::<Lifecycle>().is_ok_and(Lifecycle::is_active) {
        return Err(AppError::NotFound("Task"));
    }

    let sql = format!(
        "SELECT {} FROM task_assignments WHERE task_id = ? AND assignment_status = ? ORDER BY id",
        ASSIGNMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, TaskAssignment>(&sql)
        .bind(task_id)
        .bind(AssignmentStatus::Active.to_string())
        .fetch_all(&mut **tx)
        .await?;

    let shares = rows
        .into_iter()
        .map(|a| Share {
            assignment_id: Some(a.id),
            worker_id: a.worker_id,
            percentage: a.percentage,
            is_paid: a.is_paid,
        })
        .collect();

    let budget = task.total_budget;
    Ok((task, Distribution::new(budget, shares)))
}

/// Writes percentage and payment of every unpaid share that already has a row.
async fn store_unpaid_shares(
    tx: &mut Transaction<'_, MySql>,
    budget: f64,
    distribution: &Distribution,
) -> Result<(), AppError> {
    for share in distribution.shares().iter().filter(|s| !s.is_paid) {
        let Some(assignment_id) = share.assignment_id else {
            continue;
        };
        sqlx::query(
            "UPDATE task_assignments SET percentage = ?, worker_payment = ? WHERE id = ? AND is_paid = FALSE",
        )
        .bind(share.percentage)
        .bind(round2(share_of(budget, share.percentage)))
        .bind(assignment_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn distribution_response(task: &Task, distribution: &Distribution) -> DistributionResponse {
    DistributionResponse {
        task_id: task.id,
        total_budget: task.total_budget,
        shares: distribution
            .payments()
            .into_iter()
            .map(|p| SharePayment {
                worker_payment: round2(p.worker_payment),
                ..p
            })
            .collect(),
    }
}

/// Adds a worker to the task. Paid shares keep their percentage; what is left
/// is split equally between the unpaid shares and the new worker.
#[utoipa::path(
    post,
    path = "/api/tasks/{task_id}/assignments",
    params(("task_id", Path, description = "Task ID")),
    request_body = AssignWorker,
    responses(
        (status = 200, body = DistributionResponse),
        (status = 400, description = "Paid shares already take the whole budget"),
        (status = 404, description = "Task or worker not found"),
        (status = 409, description = "Worker already assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn assign_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignWorker>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let task_id = path.into_inner();

    let contract_type = payload.contract_type.unwrap_or(PaymentType::ATrato);
    if contract_type == PaymentType::Custom {
        return Err(AppError::Validation("contract_type must be a_trato or por_dia".into()));
    }
    fetch_worker(pool.get_ref(), payload.worker_id).await?;

    let mut tx = pool.begin().await?;
    let (task, mut distribution) = lock_distribution(&mut tx, task_id).await?;

    distribution.assign(payload.worker_id)?;
    store_unpaid_shares(&mut tx, task.total_budget, &distribution).await?;

    let percentage = distribution
        .shares()
        .iter()
        .find(|s| s.worker_id == payload.worker_id)
        .map(|s| s.percentage)
        .unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO task_assignments (task_id, worker_id, percentage, worker_payment, contract_type, assignment_status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task_id)
    .bind(payload.worker_id)
    .bind(percentage)
    .bind(round2(share_of(task.total_budget, percentage)))
    .bind(contract_type.to_string())
    .bind(AssignmentStatus::Active.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(task_id, worker_id = payload.worker_id, percentage, "Worker assigned");
    Ok(HttpResponse::Ok().json(distribution_response(&task, &distribution)))
}

/// Flags the assignment as removed. Other shares are not rebalanced; the
/// caller follows up with an explicit adjustment.
#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}/assignments/{worker_id}",
    params(
        ("task_id", Path, description = "Task ID"),
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, body = DistributionResponse),
        (status = 400, description = "Worker not assigned or already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn remove_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let (task_id, worker_id) = path.into_inner();

    let mut tx = pool.begin().await?;
    let (task, mut distribution) = lock_distribution(&mut tx, task_id).await?;

    let removed = distribution.remove(worker_id)?;
    if let Some(assignment_id) = removed.assignment_id {
        sqlx::query("UPDATE task_assignments SET assignment_status = ? WHERE id = ? AND is_paid = FALSE")
            .bind(AssignmentStatus::Removed.to_string())
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    if !distribution.is_balanced() {
        tracing::warn!(
            task_id,
            total = distribution.total_percentage(),
            "Distribution no longer adds up to 100 after removal"
        );
    }

    info!(task_id, worker_id, "Worker removed from task");
    Ok(HttpResponse::Ok().json(distribution_response(&task, &distribution)))
}

/// Replaces the percentage of every active worker. The request is validated
/// as a whole before anything is written.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}/distribution",
    params(("task_id", Path, description = "Task ID")),
    request_body = AdjustDistribution,
    responses(
        (status = 200, body = DistributionResponse),
        (status = 400, description = "Percentages out of range, not adding to 100, or touching a paid share"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn adjust_distribution(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdjustDistribution>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let task_id = path.into_inner();

    validate_proposal(&payload.shares)?;

    let mut tx = pool.begin().await?;
    let (task, mut distribution) = lock_distribution(&mut tx, task_id).await?;

    distribution.adjust(&payload.shares)?;
    store_unpaid_shares(&mut tx, task.total_budget, &distribution).await?;
    tx.commit().await?;

    info!(task_id, workers = payload.shares.len(), "Distribution adjusted");
    Ok(HttpResponse::Ok().json(distribution_response(&task, &distribution)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, lazy_pool, test_config};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;

    #[actix_web::test]
    async fn unbalanced_adjustment_is_rejected_before_touching_the_database() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(lazy_pool()))
                .route("/tasks/{task_id}/distribution", web::put().to(adjust_distribution)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/tasks/1/distribution")
            .insert_header(("Authorization", bearer(2)))
            .set_json(json!({ "shares": [
                { "worker_id": 1, "percentage": 60.0 },
                { "worker_id": 2, "percentage": 30.0 }
            ]}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("90.00"));
    }

    #[actix_web::test]
    async fn viewer_cannot_adjust() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(lazy_pool()))
                .route("/tasks/{task_id}/distribution", web::put().to(adjust_distribution)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/tasks/1/distribution")
            .insert_header(("Authorization", bearer(4)))
            .set_json(json!({ "shares": [{ "worker_id": 1, "percentage": 100.0 }] }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
