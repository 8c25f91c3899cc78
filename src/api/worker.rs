use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_duplicate_key},
    model::worker::Worker,
    utils::{
        db_utils::{build_update_sql, execute_update},
        rut::Rut,
        rut_cache, rut_filter,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["full_name", "role", "phone", "is_active"];
const WORKER_COLUMNS: &str = "id, rut, full_name, role, phone, is_active, created_at";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateWorker {
    #[schema(example = "12.345.678-5")]
    pub rut: String,
    #[schema(example = "Juan Pérez")]
    pub full_name: String,
    #[schema(example = "albañil")]
    pub role: String,
    #[schema(example = "+56912345678", nullable = true)]
    pub phone: Option<String>,
}

/// Fields accepted by the partial update; any subset may be sent.
#[derive(Deserialize, Serialize, ToSchema)]
pub struct UpdateWorker {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct WorkerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_active: Option<bool>,
    /// Search by name or RUT
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerListResponse {
    pub data: Vec<Worker>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// true => some worker already holds this RUT
async fn rut_taken(rut: &str, pool: &MySqlPool) -> Result<bool, AppError> {
    // Cuckoo filter: fast negative
    if !rut_filter::might_exist(rut) {
        return Ok(false);
    }

    // Moka cache: fast positive
    if rut_cache::worker_for(rut).await.is_some() {
        return Ok(true);
    }

    let found: Option<u64> = sqlx::query_scalar("SELECT id FROM workers WHERE rut = ?")
        .bind(rut)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = found {
        rut_cache::remember(rut, id).await;
    }
    Ok(found.is_some())
}

#[utoipa::path(
    post,
    path = "/api/workers",
    request_body = CreateWorker,
    responses(
        (status = 201, description = "Worker created", body = Worker),
        (status = 400, description = "Invalid RUT"),
        (status = 409, description = "RUT already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn create_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorker>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let parsed = payload.rut.parse::<Rut>()?;
    let rut = parsed.to_string();
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("full_name must not be empty".into()));
    }

    if rut_taken(&rut, pool.get_ref()).await? {
        return Err(AppError::Conflict(format!("RUT {} is already registered", parsed.dotted())));
    }

    let result = sqlx::query("INSERT INTO workers (rut, full_name, role, phone) VALUES (?, ?, ?, ?)")
        .bind(&rut)
        .bind(full_name)
        .bind(payload.role.trim())
        .bind(payload.phone.as_deref())
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::Conflict(format!("RUT {} is already registered", parsed.dotted())));
        }
        Err(e) => return Err(e.into()),
    };

    rut_filter::insert(&rut);
    rut_cache::remember(&rut, id).await;
    info!(worker_id = id, %rut, "Worker created");

    let worker = fetch_worker(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(worker))
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, query: &WorkerQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = &query.search {
        let like = format!("%{}%", search.trim());
        qb.push(" AND (full_name LIKE ")
            .push_bind(like.clone())
            .push(" OR rut LIKE ")
            .push_bind(like)
            .push(")");
    }
}

pub(crate) async fn fetch_worker(pool: &MySqlPool, id: u64) -> Result<Worker, AppError> {
    let sql = format!("SELECT {} FROM workers WHERE id = ?", WORKER_COLUMNS);
    sqlx::query_as::<_, Worker>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Worker"))
}

#[utoipa::path(
    get,
    path = "/api/workers",
    params(WorkerQuery),
    responses((status = 200, description = "Paginated worker list", body = WorkerListResponse)),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn list_workers(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkerQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM workers");
    push_filters(&mut count_qb, &query);
    debug!(sql = %count_qb.sql(), "Counting workers");
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data_qb = QueryBuilder::<MySql>::new(format!("SELECT {} FROM workers", WORKER_COLUMNS));
    push_filters(&mut data_qb, &query);
    data_qb
        .push(" ORDER BY full_name LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset as i64);
    let data = data_qb
        .build_query_as::<Worker>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(WorkerListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}",
    params(("worker_id", Path, description = "Worker ID")),
    responses(
        (status = 200, body = Worker),
        (status = 404, description = "Worker not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn get_worker(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let worker = fetch_worker(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(worker))
}

/// Partial update; the RUT is immutable.
#[utoipa::path(
    put,
    path = "/api/workers/{worker_id}",
    params(("worker_id", Path, description = "Worker ID")),
    request_body = UpdateWorker,
    responses(
        (status = 200, description = "Worker updated"),
        (status = 400, description = "Field cannot be updated"),
        (status = 404, description = "Worker not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn update_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let worker_id = path.into_inner();

    let update = build_update_sql("workers", UPDATABLE, &body, "id", worker_id)?;
    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        // MySQL reports 0 for a no-op update too
        fetch_worker(pool.get_ref(), worker_id).await?;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Worker updated successfully" })))
}
