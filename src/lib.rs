//! Schema Gate Library
//!
//! Brings a SQLite schema up to date with a directory of versioned SQL
//! migrations at process startup, delegating the actual migration work to
//! SQLx.

pub mod config;
pub mod db;
pub mod services;
pub mod utils;

pub use config::{AppConfig, MigrationsConfig, VersionErrorPolicy};
pub use db::{DbPool, MigrationRunner, SqlxRunner};
pub use services::{GateOutcome, SchemaGate};
pub use utils::{GateError, GateResult};
