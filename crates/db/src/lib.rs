//! PostgreSQL adapters for the Casework event pipeline.
//!
//! Pool construction, the insert-only log repositories, and the two pipeline
//! integration points: [`PgEventSink`] (persists typed events into the log
//! tables) and [`PgHealthProbe`] (store connectivity for the health monitor).
//!
//! This crate deliberately exposes only the write leg of the log tables; the
//! query side lives with the HTTP API service.

pub mod models;
pub mod probe;
pub mod repositories;
pub mod sink;

pub use probe::PgHealthProbe;
pub use sink::PgEventSink;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

const MAX_CONNECTIONS: u32 = 20;

/// Creates a connection pool, verifying connectivity with an initial connect.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Creates a pool without touching the database. Connections are established
/// on first use, so the worker can start while the store is down and let the
/// health monitor drive recovery.
pub fn create_pool_lazy(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_lazy(database_url)
}

/// Cheap connectivity check used by readiness endpoints.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Bounded-latency connectivity check. Returns `false` on error or timeout
/// instead of surfacing the failure, which is the shape health probes want.
pub async fn can_connect(pool: &DbPool, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, health_check(pool)).await,
        Ok(Ok(()))
    )
}
