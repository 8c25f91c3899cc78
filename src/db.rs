use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::Role;

pub async fn init_db(config: &Config) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations complete");
    }

    if let Some((username, password)) = &config.bootstrap_admin {
        ensure_admin(&pool, username, password).await?;
    }

    Ok(pool)
}

/// Creates the first admin account when no users exist yet.
async fn ensure_admin(pool: &MySqlPool, username: &str, password: &str) -> Result<()> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if users > 0 {
        return Ok(());
    }

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("hashing failed: {}", e))?;
    sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(username.to_lowercase())
        .bind(hashed)
        .bind(Role::Admin as u8)
        .execute(pool)
        .await?;

    tracing::info!(%username, "Bootstrap admin created");
    Ok(())
}
