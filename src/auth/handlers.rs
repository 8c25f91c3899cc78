use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, is_duplicate_key},
    model::role::Role,
    models::{Claims, LoginReqDto, TokenType, UserReq, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

#[derive(Serialize, Deserialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues a new access/refresh pair and stores the refresh token's jti.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    username: &str,
    role: u8,
) -> Result<TokenPair, AppError> {
    let access_token =
        generate_access_token(user_id, username, role, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| AppError::Internal(e.to_string()))?;

    let (refresh_token, refresh_claims): (String, Claims) =
        generate_refresh_token(user_id, username, role, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::Internal(e.to_string()))?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// User registration handler. Only admins create accounts.
pub async fn register(
    auth: crate::auth::auth::AuthUser,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password must not be empty".into(),
        ));
    }
    if Role::from_id(user.role_id).is_none() {
        return Err(AppError::Validation(format!("Unknown role id {}", user.role_id)));
    }

    let hashed = hash_password(&user.password).map_err(|e| AppError::Internal(e.to_string()))?;

    let result = sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(&username)
        .bind(hashed)
        .bind(user.role_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!(%username, role_id = user.role_id, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict("Username already exists".into())),
        Err(e) => Err(e.into()),
    }
}

#[instrument(name = "auth_login", skip(pool, config, user), fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(u)) if u.is_active => u,
        Ok(_) => {
            info!("Invalid credentials: user not found or inactive");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    let pair = match issue_pair(
        pool.get_ref(),
        config.get_ref(),
        db_user.id,
        &db_user.username,
        db_user.role_id,
    )
    .await
    {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Failed to issue tokens");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // intentionally not failing login
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    HttpResponse::Ok().json(pair)
}

/// Rotates a refresh token: the presented one is revoked, a new pair is issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let Some(token) = bearer(&req) else {
        return Ok(HttpResponse::Unauthorized().body("No token"));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Ok(HttpResponse::Unauthorized().finish()),
    };

    let mut tx = pool.begin().await?;

    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()",
    )
    .bind(&claims.jti)
    .execute(&mut *tx)
    .await?;

    if revoked.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(HttpResponse::Unauthorized().finish());
    }
    tx.commit().await?;

    let pair = issue_pair(
        pool.get_ref(),
        config.get_ref(),
        claims.user_id,
        &claims.sub,
        claims.role,
    )
    .await?;

    Ok(HttpResponse::Ok().json(pair))
}

/// Revokes the presented refresh token. Always answers 204.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
