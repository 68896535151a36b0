//! Schema gate decision tests
//!
//! Drives the gate against real SQLite databases and a recording runner, so
//! every test can tell whether migrations would have been applied.

use schema_gate::{
    services::FreshInstallReason, GateError, GateOutcome, MigrationsConfig, SchemaGate,
    VersionErrorPolicy,
};

use crate::common::{MigrationDir, RecordingRunner, TestDb};

const TABLE: &str = "_sqlx_migrations";
const COLUMN: &str = "version";

#[tokio::test]
async fn test_up_to_date_database_skips_migrations() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2, 3]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::UpToDate {
            applied: 3,
            available: 3
        }
    );
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_database_behind_triggers_migrations() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(outcome, GateOutcome::Upgrade { from: 2, to: 3 });
    assert_eq!(runner.calls(), vec![dir.path().to_path_buf()]);
}

#[tokio::test]
async fn test_missing_table_triggers_full_install_without_reading_directory() {
    let db = TestDb::new().await;
    let dir = MigrationDir::new();
    let runner = RecordingRunner::new();

    // The directory does not exist; a fresh install must not need it
    let migrations_dir = dir.missing_path();
    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(&migrations_dir),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::FreshInstall {
            reason: FreshInstallReason::MissingTable
        }
    );
    assert_eq!(runner.calls(), vec![migrations_dir]);
}

#[tokio::test]
async fn test_empty_table_triggers_full_install() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::FreshInstall {
            reason: FreshInstallReason::EmptyTable
        }
    );
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_database_ahead_of_directory_is_up_to_date() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2, 3, 4, 5]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::UpToDate {
            applied: 5,
            available: 3
        }
    );
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_non_migration_entries_do_not_count() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1]).await;
    let dir = MigrationDir::new()
        .file("1_init.sql", "")
        .file("9_notes.txt", "")
        .file("7_backup.sql.bak", "")
        .file("draft_cleanup.sql", "")
        .file("README.md", "")
        .subdir("8_archive.sql")
        .subdir("archive");
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::UpToDate {
            applied: 1,
            available: 1
        }
    );
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_unreadable_directory_is_fatal() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1]).await;
    let dir = MigrationDir::new();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.missing_path()),
        runner.clone(),
    );
    let err = gate.run().await.unwrap_err();

    assert!(matches!(err, GateError::ReadDir { .. }));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_custom_bookkeeping_table() {
    let db = TestDb::with_applied("goose_migrations", "version_id", &[1, 2]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let config = MigrationsConfig {
        table: "goose_migrations".to_string(),
        version_column: "version_id".to_string(),
        ..MigrationsConfig::for_dir(dir.path())
    };
    let gate = SchemaGate::with_runner(db.pool.clone(), config, runner.clone());
    let outcome = gate.run().await.unwrap();

    assert_eq!(outcome, GateOutcome::Upgrade { from: 2, to: 3 });
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_query_failure_falls_back_to_fresh_install_by_default() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2, 3]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    // The table exists but the column does not
    let config = MigrationsConfig {
        version_column: "version_id".to_string(),
        ..MigrationsConfig::for_dir(dir.path())
    };
    let gate = SchemaGate::with_runner(db.pool.clone(), config, runner.clone());
    let outcome = gate.run().await.unwrap();

    assert!(matches!(
        outcome,
        GateOutcome::FreshInstall {
            reason: FreshInstallReason::QueryFailed(_)
        }
    ));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_query_failure_is_fatal_with_fail_policy() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2, 3]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let config = MigrationsConfig {
        version_column: "version_id".to_string(),
        on_version_error: VersionErrorPolicy::Fail,
        ..MigrationsConfig::for_dir(dir.path())
    };
    let gate = SchemaGate::with_runner(db.pool.clone(), config, runner.clone());
    let err = gate.run().await.unwrap_err();

    assert!(matches!(err, GateError::VersionQuery(_)));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_missing_table_is_fresh_install_even_with_fail_policy() {
    let db = TestDb::new().await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let config = MigrationsConfig {
        on_version_error: VersionErrorPolicy::Fail,
        ..MigrationsConfig::for_dir(dir.path())
    };
    let gate = SchemaGate::with_runner(db.pool.clone(), config, runner.clone());
    let outcome = gate.run().await.unwrap();

    assert_eq!(
        outcome,
        GateOutcome::FreshInstall {
            reason: FreshInstallReason::MissingTable
        }
    );
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_plan_never_runs_migrations() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::new();

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let outcome = gate.plan().await.unwrap();

    assert_eq!(outcome, GateOutcome::Upgrade { from: 1, to: 3 });
    assert!(outcome.needs_migrations());
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_runner_failure_propagates() {
    let db = TestDb::with_applied(TABLE, COLUMN, &[1, 2]).await;
    let dir = MigrationDir::with_three_migrations();
    let runner = RecordingRunner::failing(2);

    let gate = SchemaGate::with_runner(
        db.pool.clone(),
        MigrationsConfig::for_dir(dir.path()),
        runner.clone(),
    );
    let err = gate.run().await.unwrap_err();

    assert!(matches!(err, GateError::Migrate(_)));
    assert_eq!(runner.call_count(), 1);
}
