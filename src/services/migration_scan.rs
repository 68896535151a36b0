//! Migration directory scanning
//!
//! Works out the highest migration version available on disk from file names
//! of the form `<version>_<description>.sql`. Only the names are inspected;
//! file contents are the runner's business.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::utils::{GateError, GateResult};

/// Result of scanning a migrations directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationScan {
    /// Highest version found, 0 when no file carried a usable version
    pub max_version: i64,
    /// Files whose version prefix parsed
    pub migrations: usize,
    /// Files with the migration suffix whose prefix did not parse
    pub skipped: usize,
}

/// Extract the version prefix of a migration file name
///
/// Returns `None` when the name does not end with `suffix` or when the text
/// before the first `separator` is not an integer.
pub fn parse_migration_version(file_name: &str, suffix: &str, separator: char) -> Option<i64> {
    if !file_name.ends_with(suffix) {
        return None;
    }

    file_name
        .split(separator)
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
}

/// Scan `dir` for the highest available migration version
///
/// Subdirectories are never descended into. Failing to list the directory is
/// an error; a file name that does not parse is not.
pub fn scan_available_version(
    dir: &Path,
    suffix: &str,
    separator: char,
) -> GateResult<MigrationScan> {
    let read_dir_error = |source: std::io::Error| GateError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut scan = MigrationScan::default();

    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        if entry.file_type().map_err(read_dir_error)?.is_dir() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.ends_with(suffix) {
            continue;
        }

        match parse_migration_version(file_name, suffix, separator) {
            Some(version) => {
                scan.migrations += 1;
                scan.max_version = scan.max_version.max(version);
            }
            None => scan.skipped += 1,
        }
    }

    debug!(
        dir = %dir.display(),
        max_version = scan.max_version,
        migrations = scan.migrations,
        skipped = scan.skipped,
        "Scanned migrations directory"
    );

    Ok(scan)
}
