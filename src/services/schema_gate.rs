//! Startup schema gate
//!
//! Decides once, before the service starts, whether the database schema is
//! behind the migrations shipped on disk and hands the directory to the
//! migration runner if it is. The gate never selects individual migrations;
//! it only makes the go/no-go call.
//!
//! Decision order:
//! 1. Read the applied version from the bookkeeping table. A missing or empty
//!    table means the database is uninitialized and every migration runs
//!    without looking at the directory.
//! 2. Scan the directory for the highest available version. A directory that
//!    cannot be listed stops startup.
//! 3. Run the migrations when the applied version is lower than the
//!    available one.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{MigrationsConfig, VersionErrorPolicy};
use crate::db::{applied_version, AppliedVersion, DbPool, MigrationRunner, SqlxRunner};
use crate::services::migration_scan::scan_available_version;
use crate::utils::{GateError, GateResult};

/// Why the database is considered uninitialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshInstallReason {
    /// The bookkeeping table does not exist
    MissingTable,
    /// The bookkeeping table exists but has no rows
    EmptyTable,
    /// The version query failed for another reason
    QueryFailed(String),
}

impl fmt::Display for FreshInstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshInstallReason::MissingTable => write!(f, "bookkeeping table missing"),
            FreshInstallReason::EmptyTable => write!(f, "bookkeeping table empty"),
            FreshInstallReason::QueryFailed(err) => write!(f, "version query failed: {}", err),
        }
    }
}

/// Comparison of the applied version against the available one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    Upgrade { from: i64, to: i64 },
    UpToDate { applied: i64, available: i64 },
}

/// Upgrade iff the applied version is strictly below the available one
pub fn decide(applied: i64, available: i64) -> UpgradeDecision {
    if applied < available {
        UpgradeDecision::Upgrade {
            from: applied,
            to: available,
        }
    } else {
        UpgradeDecision::UpToDate { applied, available }
    }
}

/// What the gate decided
///
/// Returned by [`SchemaGate::plan`] before anything runs and by
/// [`SchemaGate::run`] once the runner has been invoked where needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Database uninitialized; every migration in the directory applies
    FreshInstall { reason: FreshInstallReason },
    /// Database behind the directory
    Upgrade { from: i64, to: i64 },
    /// Nothing to do
    UpToDate { applied: i64, available: i64 },
}

impl GateOutcome {
    /// Whether the outcome requires the migration runner
    pub fn needs_migrations(&self) -> bool {
        !matches!(self, GateOutcome::UpToDate { .. })
    }
}

impl From<UpgradeDecision> for GateOutcome {
    fn from(decision: UpgradeDecision) -> Self {
        match decision {
            UpgradeDecision::Upgrade { from, to } => GateOutcome::Upgrade { from, to },
            UpgradeDecision::UpToDate { applied, available } => {
                GateOutcome::UpToDate { applied, available }
            }
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOutcome::FreshInstall { reason } => {
                write!(f, "fresh install ({}), applying all migrations", reason)
            }
            GateOutcome::Upgrade { from, to } => {
                write!(f, "upgrade from version {} to {}", from, to)
            }
            GateOutcome::UpToDate { applied, available } => {
                write!(
                    f,
                    "up to date (applied {}, available {})",
                    applied, available
                )
            }
        }
    }
}

/// Startup gate over a database pool and a migrations directory
pub struct SchemaGate {
    pool: DbPool,
    config: MigrationsConfig,
    runner: Arc<dyn MigrationRunner>,
}

impl SchemaGate {
    /// Create a gate that applies migrations with SQLx
    pub fn new(pool: DbPool, config: MigrationsConfig) -> Self {
        let runner = Arc::new(SqlxRunner::new(config.ignore_missing));
        Self::with_runner(pool, config, runner)
    }

    /// Create a gate with a custom migration runner
    pub fn with_runner(
        pool: DbPool,
        config: MigrationsConfig,
        runner: Arc<dyn MigrationRunner>,
    ) -> Self {
        Self {
            pool,
            config,
            runner,
        }
    }

    /// Work out what [`run`](Self::run) would do without running anything
    pub async fn plan(&self) -> GateResult<GateOutcome> {
        self.config.validate()?;
        self.check_bookkeeping_table()?;

        let applied = match self.read_applied_version().await? {
            Ok(version) => version,
            Err(reason) => return Ok(GateOutcome::FreshInstall { reason }),
        };

        let scan = scan_available_version(
            &self.config.dir,
            &self.config.file_suffix,
            self.config.separator,
        )?;

        info!(
            "DB version: {}, max version: {}",
            applied, scan.max_version
        );

        Ok(decide(applied, scan.max_version).into())
    }

    /// Apply pending migrations if the schema is behind
    pub async fn run(&self) -> GateResult<GateOutcome> {
        let outcome = self.plan().await?;

        match &outcome {
            GateOutcome::FreshInstall { reason } => {
                info!(%reason, "Initializing database");
                self.run_migrations().await?;
            }
            GateOutcome::Upgrade { from, to } => {
                info!("Starting migration from version {} to {}", from, to);
                self.run_migrations().await?;
            }
            GateOutcome::UpToDate { applied, .. } => {
                info!(version = applied, "Database schema is up to date");
            }
        }

        Ok(outcome)
    }

    async fn run_migrations(&self) -> GateResult<()> {
        self.runner.run_pending(&self.pool, &self.config.dir).await
    }

    /// Reject a table the runner does not record into
    ///
    /// Reading one table while the runner writes another would report a
    /// fresh install on every start.
    fn check_bookkeeping_table(&self) -> GateResult<()> {
        let Some((table, column)) = self.runner.bookkeeping_table() else {
            return Ok(());
        };

        if self.config.table != table || self.config.version_column != column {
            return Err(GateError::Config(format!(
                "Migration runner records versions in {}.{}, but the gate is configured to read {}.{}",
                table, column, self.config.table, self.config.version_column
            )));
        }
        Ok(())
    }

    /// Applied version, or the reason the database counts as uninitialized
    async fn read_applied_version(&self) -> GateResult<Result<i64, FreshInstallReason>> {
        match applied_version(&self.pool, &self.config).await {
            Ok(AppliedVersion::Applied(version)) => Ok(Ok(version)),
            Ok(AppliedVersion::Empty) => Ok(Err(FreshInstallReason::EmptyTable)),
            Ok(AppliedVersion::Missing) => Ok(Err(FreshInstallReason::MissingTable)),
            Err(err) => match self.config.on_version_error {
                VersionErrorPolicy::FreshInstall => {
                    warn!(
                        error = %err,
                        table = %self.config.table,
                        "Failed to read applied version, treating database as uninitialized"
                    );
                    Ok(Err(FreshInstallReason::QueryFailed(err.to_string())))
                }
                VersionErrorPolicy::Fail => Err(GateError::VersionQuery(err)),
            },
        }
    }
}
