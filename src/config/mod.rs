//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::validation::{validate_file_suffix, validate_sql_identifier};
use crate::utils::{GateError, GateResult};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Migration gate configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MigrationsConfig {
    /// Directory holding `<version>_<description>.sql` files
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
    /// Bookkeeping table written by the migration runner
    ///
    /// Must match the runner's own table; SQLx always records into
    /// `_sqlx_migrations.version`.
    #[serde(default = "default_migrations_table")]
    pub table: String,
    /// Column of the bookkeeping table holding the version number
    #[serde(default = "default_version_column")]
    pub version_column: String,
    /// Only files ending with this suffix are considered
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,
    /// Character separating the version prefix from the description
    #[serde(default = "default_version_separator")]
    pub separator: char,
    /// What to do when the applied version cannot be read for a reason
    /// other than a missing table
    #[serde(default)]
    pub on_version_error: VersionErrorPolicy,
    /// Let the runner proceed when the database records versions that no
    /// longer exist on disk
    #[serde(default)]
    pub ignore_missing: bool,
}

/// Handling of version query failures other than a missing table
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VersionErrorPolicy {
    /// Treat the database as uninitialized and apply every migration
    #[default]
    FreshInstall,
    /// Abort startup
    Fail,
}

impl std::str::FromStr for VersionErrorPolicy {
    type Err = GateError;

    fn from_str(value: &str) -> GateResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "fresh_install" => Ok(VersionErrorPolicy::FreshInstall),
            "fail" => Ok(VersionErrorPolicy::Fail),
            other => Err(GateError::Config(format!(
                "Invalid version error policy: {:?}. Must be 'fresh_install' or 'fail'",
                other
            ))),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("./migrations")
}

fn default_migrations_table() -> String {
    "_sqlx_migrations".to_string()
}

fn default_version_column() -> String {
    "version".to_string()
}

fn default_file_suffix() -> String {
    ".sql".to_string()
}

fn default_version_separator() -> char {
    '_'
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            table: default_migrations_table(),
            version_column: default_version_column(),
            file_suffix: default_file_suffix(),
            separator: default_version_separator(),
            on_version_error: VersionErrorPolicy::default(),
            ignore_missing: false,
        }
    }
}

impl MigrationsConfig {
    /// Gate configuration for a given directory, everything else default
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Validate the gate settings
    pub fn validate(&self) -> GateResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(GateError::Config(
                "Migrations directory cannot be empty".to_string(),
            ));
        }

        // Table and column names are interpolated into the version query
        if !validate_sql_identifier(&self.table) {
            return Err(GateError::Config(format!(
                "Invalid migrations table name: {:?}",
                self.table
            )));
        }
        if !validate_sql_identifier(&self.version_column) {
            return Err(GateError::Config(format!(
                "Invalid version column name: {:?}",
                self.version_column
            )));
        }

        if !validate_file_suffix(&self.file_suffix) {
            return Err(GateError::Config(format!(
                "Invalid migration file suffix: {:?}. Must start with '.'",
                self.file_suffix
            )));
        }

        if !self.separator.is_ascii_punctuation() {
            return Err(GateError::Config(format!(
                "Invalid version separator: {:?}",
                self.separator
            )));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "schema-gate")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr)
    #[default]
    Console,
    /// Log to file with optional rotation
    File,
    /// Log to both console and file
    Both,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_prefix() -> String {
    "schema-gate".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/app.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            migrations: MigrationsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SCHEMA_GATE_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/schema-gate/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("schema-gate/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> GateResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    fn apply_overrides<F>(&mut self, lookup: F) -> GateResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database overrides
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }

        // Migration overrides
        if let Some(dir) = lookup("SCHEMA_GATE_MIGRATIONS_DIR") {
            self.migrations.dir = PathBuf::from(dir);
        }
        if let Some(table) = lookup("SCHEMA_GATE_MIGRATIONS_TABLE") {
            self.migrations.table = table;
        }
        if let Some(policy) = lookup("SCHEMA_GATE_ON_VERSION_ERROR") {
            self.migrations.on_version_error = policy.parse()?;
        }

        // Logging overrides
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SCHEMA_GATE_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        self.migrations.validate()?;

        Ok(())
    }
}
