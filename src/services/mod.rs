//! Business logic services

pub mod migration_scan;
pub mod schema_gate;

pub use migration_scan::{parse_migration_version, scan_available_version, MigrationScan};
pub use schema_gate::{decide, FreshInstallReason, GateOutcome, SchemaGate, UpgradeDecision};
