use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    tracing::debug!(path = %req.path(), reason = message, "Request rejected by auth");
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    req.into_response(resp.map_into_boxed_body())
}

/// Guards the `/api` scope: a valid access token with a known role is
/// required before any handler runs. Handlers still extract `AuthUser` for
/// role checks.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = match req.app_data::<Data<Config>>() {
        Some(config) => config.jwt_secret.clone(),
        None => return Err(actix_web::error::ErrorInternalServerError("App config missing")),
    };

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned);

    let Some(token) = token else {
        return Ok(reject(req, "Missing or malformed Authorization header"));
    };

    let claims = match verify_token(&token, &secret) {
        Ok(c) => c,
        Err(_) => return Ok(reject(req, "Invalid or expired token")),
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, "Access token required"));
    }
    if Role::from_id(claims.role).is_none() {
        return Ok(reject(req, "Invalid role"));
    }

    tracing::debug!(user_id = claims.user_id, path = %req.path(), "Authenticated request");

    next.call(req).await
}
