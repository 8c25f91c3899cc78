use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{
        lifecycle::Lifecycle,
        project::{Apartment, Floor, Project, Tower},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Edificio Los Aromos")]
    pub name: String,
    #[schema(nullable = true)]
    pub address: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTower {
    #[schema(example = "Torre A")]
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateFloor {
    #[schema(example = 3)]
    pub floor_number: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateApartment {
    #[schema(example = "301")]
    pub apartment_number: String,
}

#[derive(Deserialize, IntoParams)]
pub struct ProjectQuery {
    /// Include archived projects
    pub include_archived: Option<bool>,
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(value)
}

/// Fails with 404 unless `id` names an active row of `table`.
async fn ensure_active(
    pool: &MySqlPool,
    table: &str,
    id: u64,
    what: &'static str,
) -> Result<(), AppError> {
    let sql = format!("SELECT lifecycle FROM {} WHERE id = ?", table);
    let lifecycle: Option<String> = sqlx::query_scalar(&sql).bind(id).fetch_optional(pool).await?;

    match lifecycle {
        Some(raw) if raw.parse::<Lifecycle>().is_ok_and(Lifecycle::is_active) => Ok(()),
        _ => Err(AppError::NotFound(what)),
    }
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid payload")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let name = non_empty(&payload.name, "name")?;

    let mut tx = pool.begin().await?;
    let id = sqlx::query("INSERT INTO projects (name, address) VALUES (?, ?)")
        .bind(name)
        .bind(payload.address.as_deref())
        .execute(&mut *tx)
        .await?
        .last_insert_id();

    sqlx::query("INSERT INTO income_tracking (project_id) VALUES (?)")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(project_id = id, "Project created");

    let project = sqlx::query_as::<_, Project>(
        "SELECT id, name, address, lifecycle, created_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectQuery),
    responses((status = 200, body = [Project])),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProjectQuery>,
) -> Result<HttpResponse, AppError> {
    let projects = if query.include_archived.unwrap_or(false) {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, address, lifecycle, created_at FROM projects ORDER BY id",
        )
        .fetch_all(pool.get_ref())
        .await?
    } else {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, address, lifecycle, created_at FROM projects WHERE lifecycle = ? ORDER BY id",
        )
        .bind(Lifecycle::Active.to_string())
        .fetch_all(pool.get_ref())
        .await?
    };

    Ok(HttpResponse::Ok().json(projects))
}

/// Archives a project. Its rows stay in place; archived projects drop out of
/// the pending-payment summary.
#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}",
    params(("project_id", Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project archived"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn archive_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let project_id = path.into_inner();

    let result = sqlx::query("UPDATE projects SET lifecycle = ? WHERE id = ? AND lifecycle = ?")
        .bind(Lifecycle::Archived.to_string())
        .bind(project_id)
        .bind(Lifecycle::Active.to_string())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Project"));
    }

    info!(project_id, user_id = auth.user_id, "Project archived");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/towers",
    params(("project_id", Path, description = "Project ID")),
    request_body = CreateTower,
    responses(
        (status = 201, body = Tower),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_tower(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateTower>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let project_id = path.into_inner();
    let name = non_empty(&payload.name, "name")?;
    ensure_active(pool.get_ref(), "projects", project_id, "Project").await?;

    let id = sqlx::query("INSERT INTO towers (project_id, name) VALUES (?, ?)")
        .bind(project_id)
        .bind(name)
        .execute(pool.get_ref())
        .await?
        .last_insert_id();

    Ok(HttpResponse::Created().json(Tower {
        id,
        project_id,
        name: name.to_string(),
        lifecycle: Lifecycle::Active.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/towers/{tower_id}/floors",
    params(("tower_id", Path, description = "Tower ID")),
    request_body = CreateFloor,
    responses(
        (status = 201, body = Floor),
        (status = 404, description = "Tower not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_floor(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateFloor>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let tower_id = path.into_inner();
    ensure_active(pool.get_ref(), "towers", tower_id, "Tower").await?;

    let id = sqlx::query("INSERT INTO floors (tower_id, floor_number) VALUES (?, ?)")
        .bind(tower_id)
        .bind(payload.floor_number)
        .execute(pool.get_ref())
        .await?
        .last_insert_id();

    Ok(HttpResponse::Created().json(Floor {
        id,
        tower_id,
        floor_number: payload.floor_number,
        lifecycle: Lifecycle::Active.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/floors/{floor_id}/apartments",
    params(("floor_id", Path, description = "Floor ID")),
    request_body = CreateApartment,
    responses(
        (status = 201, body = Apartment),
        (status = 404, description = "Floor not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_apartment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateApartment>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;
    let floor_id = path.into_inner();
    let number = non_empty(&payload.apartment_number, "apartment_number")?;
    ensure_active(pool.get_ref(), "floors", floor_id, "Floor").await?;

    let id = sqlx::query("INSERT INTO apartments (floor_id, apartment_number) VALUES (?, ?)")
        .bind(floor_id)
        .bind(number)
        .execute(pool.get_ref())
        .await?
        .last_insert_id();

    Ok(HttpResponse::Created().json(Apartment {
        id,
        floor_id,
        apartment_number: number.to_string(),
        lifecycle: Lifecycle::Active.to_string(),
    }))
}

pub(crate) async fn ensure_active_project(pool: &MySqlPool, project_id: u64) -> Result<(), AppError> {
    ensure_active(pool, "projects", project_id, "Project").await
}

pub(crate) async fn ensure_active_apartment(pool: &MySqlPool, apartment_id: u64) -> Result<(), AppError> {
    ensure_active(pool, "apartments", apartment_id, "Apartment").await
}
