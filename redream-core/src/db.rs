use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// `create_pool`, retried with exponential backoff while the database comes up.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let strategy = ExponentialBackoff::from_millis(config.retry_delay_ms)
        .max_delay(Duration::from_secs(10))
        .map(jitter)
        .take(config.connect_retries);

    Retry::spawn(strategy, || async {
        create_pool(config).await.map_err(|e| {
            tracing::warn!(error = %e, "Database connection attempt failed");
            e
        })
    })
    .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dreams (
            id              BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
            dream_text      TEXT NOT NULL CHECK (dream_text <> ''),
            keywords        TEXT[] NOT NULL DEFAULT '{}',
            emotion         TEXT NOT NULL CHECK (emotion IN ('POSITIVE', 'NEUTRAL', 'NEGATIVE')),
            confidence      REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
            search_results  TEXT NOT NULL,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
