//! The migration ledger: one row per applied script.
//!
//! [`Ledger`] is a thin, stateless view over the ledger table. Its methods
//! take a `&Connection` so callers can pass a [`rusqlite::Transaction`]
//! (which derefs to `Connection`) and make a ledger write part of the same
//! transaction as the script it records.
//!
//! # Example
//!
//! ```
//! use sqlmig_sqlite::Ledger;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let ledger = Ledger::new("_migrations").unwrap();
//! ledger.ensure_schema(&conn).unwrap();
//!
//! ledger.record_applied(&conn, "001_init.sql", "CREATE TABLE t (id INTEGER);").unwrap();
//! assert_eq!(ledger.latest_filename(&conn).unwrap().as_deref(), Some("001_init.sql"));
//! assert!(ledger.list_applied_filenames(&conn).unwrap().contains("001_init.sql"));
//! ```

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};
use crate::schema::{generate_ledger_sql, validate_identifier};

/// One applied migration, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Row identifier assigned by the store. Not used for ordering.
    pub id: i64,
    /// Script filename, unique across the ledger.
    pub filename: String,
    /// Exact SQL text that was executed.
    pub sql: String,
    /// Time of application (UTC), set by the store at insert.
    pub applied_at: NaiveDateTime,
}

impl MigrationRecord {
    /// SHA-256 hex digest of the recorded SQL text.
    pub fn checksum(&self) -> String {
        checksum(&self.sql)
    }
}

/// Computes the SHA-256 hex digest of a script's text.
pub fn checksum(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.as_bytes()))
}

/// Storage and lookup for applied migrations.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Creates a ledger view over `table`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidIdentifier`] if the table name is not a
    /// plain identifier.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { table })
    }

    /// Name of the ledger table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the ledger table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::SchemaSetupError`] if the table cannot be created.
    pub fn ensure_schema(&self, conn: &Connection) -> Result<()> {
        let sql = generate_ledger_sql(&self.table)?;
        conn.execute_batch(&sql).map_err(|e| {
            MigrateError::SchemaSetupError(format!(
                "failed to create ledger table '{}': {e}",
                self.table
            ))
        })
    }

    /// Returns whether the ledger table exists.
    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Returns every recorded filename.
    pub fn list_applied_filenames(&self, conn: &Connection) -> Result<BTreeSet<String>> {
        let mut stmt = conn.prepare(&format!("SELECT filename FROM {}", self.table))?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(names)
    }

    /// Inserts a ledger row for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicateMigrationError`] if `filename` is
    /// already recorded; the ledger is left unchanged.
    pub fn record_applied(&self, conn: &Connection, filename: &str, sql: &str) -> Result<()> {
        let result = conn.execute(
            &format!("INSERT INTO {} (filename, sql) VALUES (?1, ?2)", self.table),
            params![filename, sql],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(MigrateError::DuplicateMigrationError(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the filename of the most recently inserted record.
    pub fn latest_filename(&self, conn: &Connection) -> Result<Option<String>> {
        let latest = conn
            .query_row(
                &format!("SELECT filename FROM {} ORDER BY id DESC LIMIT 1", self.table),
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(latest)
    }

    /// Returns all records in insertion order.
    pub fn records(&self, conn: &Connection) -> Result<Vec<MigrationRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, filename, sql, applied_at FROM {} ORDER BY id",
            self.table
        ))?;
        let records = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    sql: row.get(2)?,
                    applied_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
