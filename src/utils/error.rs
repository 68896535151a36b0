//! Error types and handling
//!
//! Every variant of [`GateError`] stops startup. Conditions the gate recovers
//! from on its own (a missing bookkeeping table, an unparseable migration file
//! name) never surface as errors.

use std::path::PathBuf;

use thiserror::Error;

/// Schema gate error types
#[derive(Debug, Error)]
pub enum GateError {
    /// The migrations directory could not be listed
    #[error("Failed to read migrations directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The applied version could not be read and the policy forbids
    /// treating the database as uninitialized
    #[error("Failed to read applied schema version: {0}")]
    VersionQuery(#[source] sqlx::Error),

    /// The migration runner failed to load or apply migrations
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for gate operations
pub type GateResult<T> = Result<T, GateError>;
