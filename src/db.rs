//! SQLite datastore shared by the ban list and the host status tracker.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{OnionIndexError, Result};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS banned_hosts (\
        host_hash TEXT PRIMARY KEY, \
        banned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
    "CREATE TABLE IF NOT EXISTS onion_hosts (\
        host TEXT PRIMARY KEY, \
        online INTEGER NOT NULL, \
        updated_at TEXT NOT NULL)",
];

/// Open a connection pool and create missing tables.
///
/// The parent directory of a file database is created if absent.
pub async fn connect_sqlite(config: &DatabaseConfig) -> Result<SqlitePool> {
    if !config.url.starts_with("sqlite:") {
        return Err(OnionIndexError::config(format!(
            "unsupported database url {}, expected sqlite:",
            config.url
        )));
    }
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| OnionIndexError::config(format!("invalid database url {}: {e}", config.url)))?
        .create_if_missing(true);

    if let Some(parent) = options
        .get_filename()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    debug!(url = %config.url, "connected to datastore");
    Ok(pool)
}

/// Create the tables this crate uses. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// An in-memory database on a single connection, for tests and dry runs.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    connect_sqlite(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
}
