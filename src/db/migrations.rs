//! Database migrations
//!
//! Migrations are applied by SQLx and stored in the configured migrations
//! directory. This module reads the version SQLx (or any other runner) has
//! recorded in its bookkeeping table and exposes the runner behind a trait so
//! the gate can be exercised without touching real migration files.

use std::path::Path;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use super::DbPool;
use crate::config::MigrationsConfig;
use crate::utils::GateResult;

/// State of the bookkeeping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedVersion {
    /// Highest version recorded in the table
    Applied(i64),
    /// Table exists but holds no rows
    Empty,
    /// Table does not exist yet
    Missing,
}

/// Read the most recent version from the bookkeeping table
///
/// A missing table is reported as [`AppliedVersion::Missing`]; every other
/// query failure is returned to the caller unclassified.
pub async fn applied_version(
    pool: &DbPool,
    config: &MigrationsConfig,
) -> Result<AppliedVersion, sqlx::Error> {
    // Identifiers are validated when the configuration is loaded
    let query = format!(
        "SELECT {column} FROM {table} ORDER BY {column} DESC LIMIT 1",
        column = config.version_column,
        table = config.table,
    );

    match sqlx::query_scalar::<_, i64>(&query)
        .fetch_optional(pool)
        .await
    {
        Ok(Some(version)) => Ok(AppliedVersion::Applied(version)),
        Ok(None) => Ok(AppliedVersion::Empty),
        Err(err) if is_missing_table(&err) => {
            debug!(table = %config.table, "Bookkeeping table does not exist");
            Ok(AppliedVersion::Missing)
        }
        Err(err) => Err(err),
    }
}

/// Whether a query failed because the table it reads does not exist
pub fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("no such table"),
        _ => false,
    }
}

/// Applies every pending migration found in a directory
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply whatever migrations in `dir` have not been applied to `pool` yet
    async fn run_pending(&self, pool: &DbPool, dir: &Path) -> GateResult<()>;

    /// Table and version column this runner records applied migrations in
    ///
    /// `None` when the runner writes wherever it is configured to.
    fn bookkeeping_table(&self) -> Option<(&str, &str)> {
        None
    }
}

/// Table SQLx's migrator records applied migrations in
pub const SQLX_MIGRATIONS_TABLE: &str = "_sqlx_migrations";
/// Version column of [`SQLX_MIGRATIONS_TABLE`]
pub const SQLX_VERSION_COLUMN: &str = "version";

/// [`MigrationRunner`] backed by SQLx's runtime migrator
#[derive(Debug, Clone, Default)]
pub struct SqlxRunner {
    /// Tolerate versions recorded in the database that are absent on disk
    pub ignore_missing: bool,
}

impl SqlxRunner {
    pub fn new(ignore_missing: bool) -> Self {
        Self { ignore_missing }
    }
}

#[async_trait]
impl MigrationRunner for SqlxRunner {
    async fn run_pending(&self, pool: &DbPool, dir: &Path) -> GateResult<()> {
        let mut migrator = Migrator::new(dir).await?;
        migrator.set_ignore_missing(self.ignore_missing);

        info!(
            dir = %dir.display(),
            migrations = migrator.iter().count(),
            "Running database migrations"
        );

        migrator.run(pool).await?;

        info!("Migrations completed successfully");
        Ok(())
    }

    fn bookkeeping_table(&self) -> Option<(&str, &str)> {
        Some((SQLX_MIGRATIONS_TABLE, SQLX_VERSION_COLUMN))
    }
}
