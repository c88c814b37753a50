//! Connection pool management for `PostgreSQL`.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::error::DbError;

/// Configuration options for the database connection pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Minimum number of connections to maintain in the pool.
    pub min_connections: u32,

    /// Maximum number of connections allowed in the pool.
    pub max_connections: u32,

    /// Maximum time to wait when acquiring a connection.
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Connect to `PostgreSQL` using the provided database URL.
///
/// # Errors
///
/// Returns `DbError::ConnectionFailed` if the connection cannot be established.
pub async fn create_pool(database_url: &str) -> Result<PgPool, DbError> {
    create_pool_with_options(database_url, PoolOptions::default()).await
}

/// Connect to `PostgreSQL` with custom pool options.
///
/// # Errors
///
/// Returns `DbError::ConnectionFailed` if the connection cannot be established.
pub async fn create_pool_with_options(
    database_url: &str,
    options: PoolOptions,
) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .min_connections(options.min_connections)
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}

/// Apply the embedded migrations to the target database.
///
/// Safe to run on every startup; already-applied migrations are skipped.
///
/// # Errors
///
/// Returns `DbError::MigrationFailed` if a migration cannot be applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DbError::MigrationFailed)
}
