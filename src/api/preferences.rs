use crate::{auth::auth::AuthUser, error::AppError, model::preferences::ViewPreferences};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

/// Returns the caller's saved filters, or defaults when nothing usable is stored.
#[utoipa::path(
    get,
    path = "/api/preferences",
    responses((status = 200, body = ViewPreferences)),
    security(("bearer_auth" = [])),
    tag = "Preferences"
)]
pub async fn get_preferences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let payload: Option<String> = sqlx::query_scalar("SELECT payload FROM view_preferences WHERE user_id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?;

    let prefs = payload
        .as_deref()
        .map(ViewPreferences::decode)
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(prefs))
}

#[utoipa::path(
    put,
    path = "/api/preferences",
    request_body = ViewPreferences,
    responses(
        (status = 200, body = ViewPreferences),
        (status = 400, description = "Unsupported version or inverted date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Preferences"
)]
pub async fn put_preferences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ViewPreferences>,
) -> Result<HttpResponse, AppError> {
    let prefs = payload.into_inner();
    prefs.validate().map_err(AppError::Validation)?;

    let encoded = prefs
        .encode()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    sqlx::query(
        "INSERT INTO view_preferences (user_id, payload) VALUES (?, ?) ON DUPLICATE KEY UPDATE payload = VALUES(payload)",
    )
    .bind(auth.user_id)
    .bind(encoded)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(prefs))
}
