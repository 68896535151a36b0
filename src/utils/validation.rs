//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for plain (unquoted) SQL identifiers
static SQL_IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate a table or column name that gets interpolated into SQL
pub fn validate_sql_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() <= 63 && SQL_IDENTIFIER_REGEX.is_match(name)
}

/// Validate the migration file suffix (".sql", ".up.sql", ...)
pub fn validate_file_suffix(suffix: &str) -> bool {
    suffix.len() > 1
        && suffix.starts_with('.')
        && !suffix.contains(std::path::MAIN_SEPARATOR)
        && !suffix.contains('/')
}
