//! Ledger table DDL.
//!
//! The ledger lives in the same database the migrations modify, so a
//! script's schema changes and its ledger row can commit in one
//! transaction. The table name is configurable and is interpolated into
//! SQL, so it is validated first.

use crate::error::{MigrateError, Result};

/// Validates that an identifier contains only alphanumeric characters and underscores.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::InvalidIdentifier(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Generates the `CREATE TABLE IF NOT EXISTS` statement for the ledger.
///
/// # Errors
///
/// Returns [`MigrateError::InvalidIdentifier`] if `table` is not a plain
/// identifier.
pub fn generate_ledger_sql(table: &str) -> Result<String> {
    validate_identifier(table)?;

    Ok(format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    sql TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#
    ))
}
