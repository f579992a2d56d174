//! Opening the target database.
//!
//! The process opens one connection at startup, hands it to a
//! [`Migrator`](crate::Migrator), and drops it at shutdown. There is no
//! global handle.

use std::fs;

use rusqlite::Connection;
use sqlmig_core::{MigrateConfig, PragmaConfig};
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::schema::validate_identifier;

/// Opens the database named by `config`, creating parent directories, and
/// applies the configured pragmas.
///
/// # Errors
///
/// Returns [`MigrateError::SchemaSetupError`] if the parent directory cannot
/// be created, or [`MigrateError::DatabaseError`] if SQLite fails to open the
/// file or reject a pragma.
pub fn open_connection(config: &MigrateConfig) -> Result<Connection> {
    if let Some(parent) = config
        .database
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent).map_err(|e| {
            MigrateError::SchemaSetupError(format!(
                "failed to create database directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let conn = Connection::open(&config.database)?;
    apply_pragmas(&conn, &config.pragmas)?;
    debug!(database = %config.database.display(), "opened database");
    Ok(conn)
}

/// Applies journal mode and foreign key pragmas to an open connection.
///
/// # Errors
///
/// Returns [`MigrateError::InvalidIdentifier`] if the journal mode is not a
/// bare word.
pub fn apply_pragmas(conn: &Connection, pragmas: &PragmaConfig) -> Result<()> {
    validate_identifier(&pragmas.journal_mode)?;
    let mode: String = conn.query_row(
        &format!("PRAGMA journal_mode = {}", pragmas.journal_mode),
        [],
        |row| row.get(0),
    )?;
    debug!(requested = %pragmas.journal_mode, effective = %mode, "journal mode set");

    if pragmas.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    } else {
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    }
    Ok(())
}
