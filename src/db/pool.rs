use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::utils::{with_retry, RetryPolicy};

pub async fn create_pool(config: &DatabaseConfig, url: &str) -> anyhow::Result<PgPool> {
    // The database may still be starting when the service boots.
    let pool = with_retry(
        &RetryPolicy::default(),
        |_: &sqlx::Error| true,
        || {
            PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .connect(url)
        },
    )
    .await?;

    health_check(&pool).await?;

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> anyhow::Result<bool> {
    let _result = sqlx::query("SELECT 1").fetch_one(pool).await?;

    Ok(true)
}
