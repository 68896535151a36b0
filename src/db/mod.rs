//! Database layer
//!
//! This module handles the connection pool and the two database touch points
//! of the schema gate: reading the applied version and running migrations.

pub mod migrations;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;

pub use migrations::{
    applied_version, AppliedVersion, MigrationRunner, SqlxRunner, SQLX_MIGRATIONS_TABLE,
    SQLX_VERSION_COLUMN,
};

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool
///
/// Migrations are not run here; that decision belongs to the schema gate.
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let connect_options = config
        .url
        .parse::<SqliteConnectOptions>()
        .context("Failed to parse database URL")?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}
