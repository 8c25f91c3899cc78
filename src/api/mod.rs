pub mod attendance;
pub mod contract;
pub mod invoice;
pub mod job_application;
pub mod payment;
pub mod preferences;
pub mod project;
pub mod task;
pub mod worker;

use serde::Deserialize;
use utoipa::IntoParams;

/// Page/per-page query shared by list endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Returns `(page, per_page, offset)` with page >= 1 and per_page in 1..=100.
    pub fn resolve(&self) -> (u32, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page, (page - 1) * per_page)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{auth::jwt::generate_access_token, config::Config};
    use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

    pub fn test_config() -> Config {
        Config::for_tests()
    }

    /// Pool that never connects unless a query runs.
    pub fn lazy_pool() -> MySqlPool {
        MySqlPoolOptions::new()
            .connect_lazy(&test_config().database_url)
            .unwrap()
    }

    /// Migrated pool for tests that need a real MySQL. `None` when
    /// `DATABASE_URL` is not set, so those tests return early.
    pub async fn live_pool() -> Option<MySqlPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Some(pool)
    }

    pub fn bearer(role: u8) -> String {
        let config = test_config();
        let token =
            generate_access_token(1, "tester", role, &config.jwt_secret, config.access_token_ttl).unwrap();
        format!("Bearer {}", token)
    }
}

#[cfg(test)]
mod tests {
    use super::PageQuery;

    #[test]
    fn page_bounds() {
        let q = PageQuery { page: Some(0), per_page: Some(500) };
        assert_eq!(q.resolve(), (1, 100, 0));
        let q = PageQuery { page: Some(3), per_page: None };
        assert_eq!(q.resolve(), (3, 20, 40));
    }
}
