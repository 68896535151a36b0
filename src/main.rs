//! Schema Gate - apply pending SQL migrations at startup
//!
//! Compares the schema version recorded in the database against the highest
//! version in the migrations directory and runs the migrations when the
//! database is behind. Meant to run once before the service it guards.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use config::LogFormat;
use schema_gate::{config, db, AppConfig, DbPool, MigrationsConfig, SchemaGate};

/// Exit status of `--check` when migrations are pending
const EXIT_PENDING: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(ExitCode::SUCCESS);
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("schema-gate {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let check_only = args.iter().any(|arg| arg == "--check");

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    info!("schema-gate {} starting up", env!("CARGO_PKG_VERSION"));

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    execute(pool, config.migrations.clone(), check_only).await
}

/// Run the gate, or only plan it, then close the pool whatever the result
async fn execute(pool: DbPool, migrations: MigrationsConfig, check_only: bool) -> Result<ExitCode> {
    let gate = SchemaGate::new(pool.clone(), migrations);

    let status = if check_only {
        check(&gate).await
    } else {
        run(&gate).await
    };

    pool.close().await;
    status
}

/// Report the decision without migrating
async fn check(gate: &SchemaGate) -> Result<ExitCode> {
    let outcome = gate.plan().await.context("Failed to plan migrations")?;
    println!("{}", outcome);
    if outcome.needs_migrations() {
        Ok(ExitCode::from(EXIT_PENDING))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Bring the schema up to date
async fn run(gate: &SchemaGate) -> Result<ExitCode> {
    match gate.run().await {
        Ok(outcome) => {
            info!(%outcome, "Schema gate finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Schema gate failed");
            Err(e).context("Failed to bring database schema up to date")
        }
    }
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer(&log_config.format));
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    // Ensure log directory exists
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Console layer in the configured format
fn console_layer<S>(format: &LogFormat) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
    }
}

/// Initialize console-only logging
fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::prelude::*;

    subscriber.with(console_layer(format)).init();
}

/// Initialize file logging on top of whatever layers `subscriber` carries
fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(writer))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(writer),
                )
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_writer(writer),
                )
                .init();
        }
    }
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = sqlite_file_path(&config.database.url) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Filesystem path of a SQLite URL, `None` for in-memory databases
fn sqlite_file_path(url: &str) -> Option<&str> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}

fn print_help() {
    println!(
        r#"schema-gate {}

USAGE:
    schema-gate [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --check                 Report whether migrations are pending without
                            applying them. Exits with status 2 when the
                            database is behind or uninitialized.

ENVIRONMENT:
    SCHEMA_GATE_CONFIG              Path to configuration file (default: config.yaml)
    DATABASE_URL                    Database URL (e.g. sqlite://./data/app.db)
    SCHEMA_GATE_MIGRATIONS_DIR      Migrations directory (default: ./migrations)
    SCHEMA_GATE_MIGRATIONS_TABLE    Bookkeeping table (default: _sqlx_migrations)
    SCHEMA_GATE_ON_VERSION_ERROR    fresh_install or fail (default: fresh_install)
    SCHEMA_GATE_LOG_FORMAT          pretty, compact or json
    RUST_LOG                        Log filter

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by SCHEMA_GATE_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/schema-gate/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
