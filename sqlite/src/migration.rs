//! Applying migration scripts and authoring new ones.
//!
//! [`Migrator`] reconciles the scripts directory with the ledger. Each script
//! runs inside its own transaction together with its ledger insert, so a
//! script is either fully applied and recorded or not applied at all. A batch
//! stops at the first failing script, which keeps the ledger a contiguous
//! prefix of the ordered script sequence.
//!
//! # Example
//!
//! ```no_run
//! use sqlmig_sqlite::Migrator;
//! use rusqlite::fallible_iterator::FallibleIterator;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("data.sqlite").unwrap();
//! let mut migrator = Migrator::new(conn, "migrations", "_migrations").unwrap();
//!
//! // Startup path
//! migrator.bootstrap().unwrap();
//! let report = migrator.apply_pending().unwrap();
//! println!("applied {} scripts", report.applied.len());
//!
//! // Author a new script from ad-hoc SQL
//! let filename = migrator
//!     .create_and_apply("add_media_index", "CREATE INDEX idx_media_type ON media(type);")
//!     .unwrap();
//! println!("wrote {filename}");
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection};
use serde::Serialize;
use sqlmig_core::{
    MigrateConfig, MigrationScript, discover_scripts, format_filename, max_sequence,
    parse_sequence, validate_slug,
};
use tracing::{debug, info, warn};

use crate::connection::open_connection;
use crate::error::{MigrateError, Result};
use crate::ledger::{Ledger, MigrationRecord, checksum};

/// Applies pending scripts and authors new ones against a single database.
///
/// Owns the connection for its lifetime; use
/// [`into_connection`](Self::into_connection) to take it back.
pub struct Migrator {
    conn: Connection,
    ledger: Ledger,
    scripts_dir: PathBuf,
}

impl Migrator {
    /// Creates a migrator over `conn`, reading scripts from `scripts_dir`
    /// and recording them in `ledger_table`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidIdentifier`] if the ledger table name is invalid.
    pub fn new(
        conn: Connection,
        scripts_dir: impl Into<PathBuf>,
        ledger_table: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            conn,
            ledger: Ledger::new(ledger_table)?,
            scripts_dir: scripts_dir.into(),
        })
    }

    /// Opens the configured database and builds a migrator for it.
    pub fn from_config(config: &MigrateConfig) -> Result<Self> {
        let conn = open_connection(config)?;
        Self::new(conn, &config.migrations_dir, &config.ledger_table)
    }

    /// Ensures the ledger table and the scripts directory exist.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::SchemaSetupError`] if either cannot be created.
    pub fn bootstrap(&self) -> Result<()> {
        self.ledger.ensure_schema(&self.conn)?;
        fs::create_dir_all(&self.scripts_dir).map_err(|e| {
            MigrateError::SchemaSetupError(format!(
                "failed to create migrations directory '{}': {e}",
                self.scripts_dir.display()
            ))
        })?;
        debug!(
            table = self.ledger.table(),
            dir = %self.scripts_dir.display(),
            "migration ledger ready"
        );
        Ok(())
    }

    /// Returns on-disk scripts that are not yet recorded, in filename order.
    pub fn pending(&self) -> Result<Vec<MigrationScript>> {
        let applied = self.ledger.list_applied_filenames(&self.conn)?;
        let scripts = discover_scripts(&self.scripts_dir)?;
        Ok(scripts
            .into_iter()
            .filter(|s| !applied.contains(&s.filename))
            .collect())
    }

    /// Applies every pending script in filename order.
    ///
    /// Stops at the first failure: earlier scripts stay committed, the
    /// failing script and everything after it stay unapplied.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationExecutionError`] naming the failing
    /// script, or [`MigrateError::IoError`] if a script cannot be read.
    pub fn apply_pending(&mut self) -> Result<ApplyReport> {
        let pending = self.pending()?;
        if pending.is_empty() {
            debug!("no pending migrations");
        }

        let mut report = ApplyReport::default();
        for script in pending {
            let sql = script.read_sql()?;
            self.execute_and_record(&script.filename, &sql)?;
            info!(filename = %script.filename, "applied migration");
            report.applied.push(script.filename);
        }
        Ok(report)
    }

    /// Returns the sequence number the next authored script will receive.
    ///
    /// Takes the highest prefix across the ledger and the scripts directory,
    /// so an unapplied file with a higher number is never shadowed.
    pub fn next_sequence(&self) -> Result<u32> {
        let applied = self.ledger.list_applied_filenames(&self.conn)?;
        let on_disk = if self.scripts_dir.is_dir() {
            discover_scripts(&self.scripts_dir)?
        } else {
            Vec::new()
        };

        let highest = max_sequence(
            applied
                .iter()
                .map(String::as_str)
                .chain(on_disk.iter().map(|s| s.filename.as_str())),
        )
        .unwrap_or(0);

        let latest_seq = self
            .ledger
            .latest_filename(&self.conn)?
            .as_deref()
            .and_then(parse_sequence)
            .unwrap_or(0);
        if latest_seq != highest {
            warn!(
                latest = latest_seq,
                highest, "latest ledger entry is not the highest sequence; using highest"
            );
        }

        Ok(highest.saturating_add(1))
    }

    /// Applies `sql` as a new migration named `name` and writes it to the
    /// scripts directory.
    ///
    /// The script is staged to a hidden temporary file first, applied and
    /// recorded in one transaction, then renamed into place. If the
    /// transaction fails the staged file is removed, so nothing is left on
    /// disk or in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::CoreError`] for an invalid name or an
    /// exhausted sequence, [`MigrateError::MigrationExecutionError`] if the
    /// SQL fails or contains transaction-control statements, and [`MigrateError::IoError`] if staging or the
    /// final rename fails. A rename failure happens after commit and leaves a
    /// ledger entry without a file.
    pub fn create_and_apply(&mut self, name: &str, sql: &str) -> Result<String> {
        validate_slug(name)?;
        let filename = format_filename(self.next_sequence()?, name)?;

        let target = self.scripts_dir.join(&filename);
        let staged = self.scripts_dir.join(format!(".{filename}.tmp"));
        fs::write(&staged, sql).map_err(|e| MigrateError::io(&staged, e))?;

        if let Err(err) = self.execute_and_record(&filename, sql) {
            if let Err(e) = fs::remove_file(&staged) {
                warn!(path = %staged.display(), error = %e, "failed to remove staged script");
            }
            return Err(err);
        }

        fs::rename(&staged, &target).map_err(|e| {
            warn!(%filename, "migration recorded but script file could not be written");
            MigrateError::io(&target, e)
        })?;

        info!(%filename, "created and applied migration");
        Ok(filename)
    }

    /// Returns a read-only snapshot of ledger and directory state.
    ///
    /// Works before [`bootstrap`](Self::bootstrap): a missing ledger table or
    /// scripts directory reads as empty.
    pub fn status(&self) -> Result<MigrationStatus> {
        let applied = if self.ledger.exists(&self.conn)? {
            self.ledger.records(&self.conn)?
        } else {
            Vec::new()
        };
        let scripts = if self.scripts_dir.is_dir() {
            discover_scripts(&self.scripts_dir)?
        } else {
            Vec::new()
        };

        let applied_names: BTreeSet<&str> = applied.iter().map(|r| r.filename.as_str()).collect();
        let pending = scripts
            .iter()
            .filter(|s| !applied_names.contains(s.filename.as_str()))
            .map(|s| s.filename.clone())
            .collect();

        let mut missing = Vec::new();
        let mut modified = Vec::new();
        for record in &applied {
            match scripts.iter().find(|s| s.filename == record.filename) {
                None => missing.push(record.filename.clone()),
                Some(script) => {
                    if checksum(&script.read_sql()?) != record.checksum() {
                        modified.push(record.filename.clone());
                    }
                }
            }
        }

        let latest = applied.last().map(|r| r.filename.clone());
        let next_sequence = max_sequence(
            applied
                .iter()
                .map(|r| r.filename.as_str())
                .chain(scripts.iter().map(|s| s.filename.as_str())),
        )
        .unwrap_or(0)
        .saturating_add(1);

        Ok(MigrationStatus {
            applied,
            pending,
            missing,
            modified,
            latest,
            next_sequence,
        })
    }

    /// Returns the ledger view.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the scripts directory.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migrator and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Runs `sql` and records `filename` in one transaction.
    ///
    /// Statements run one at a time so that transaction-control statements
    /// are rejected before they can end the enclosing transaction. Dropping
    /// the transaction on any error rolls both back.
    fn execute_and_record(&mut self, filename: &str, sql: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        run_script(&tx, sql).map_err(|source| MigrateError::MigrationExecutionError {
            filename: filename.to_string(),
            source,
        })?;
        if tx.is_autocommit() {
            return Err(MigrateError::MigrationExecutionError {
                filename: filename.to_string(),
                source: misuse("script ended the migration transaction"),
            });
        }
        self.ledger.record_applied(&tx, filename, sql)?;
        tx.commit()?;
        Ok(())
    }
}

/// Statements that would end or nest the applier's transaction.
const TRANSACTION_KEYWORDS: &[&str] = &["BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE"];

/// Executes every statement of `sql` in order, draining any result rows.
fn run_script(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let text = stmt.expanded_sql().unwrap_or_default();
        if let Some(keyword) = leading_keyword(&text)
            .filter(|k| TRANSACTION_KEYWORDS.contains(&k.as_str()))
        {
            return Err(misuse(&format!(
                "transaction control statement '{keyword}' is not allowed in a migration"
            )));
        }
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
    }
    Ok(())
}

/// Returns the first keyword of a statement, uppercased, skipping
/// whitespace and comments.
fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (!word.is_empty()).then(|| word.to_ascii_uppercase())
}

fn misuse(message: &str) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
        Some(message.to_string()),
    )
}

/// Scripts applied by one [`Migrator::apply_pending`] call, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Filenames of the scripts applied, in application order.
    pub applied: Vec<String>,
}

impl ApplyReport {
    /// Returns `true` if nothing was applied.
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Snapshot of ledger and scripts directory, returned by [`Migrator::status`].
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    /// Ledger records in insertion order.
    pub applied: Vec<MigrationRecord>,
    /// Scripts on disk with no ledger record, in filename order.
    pub pending: Vec<String>,
    /// Ledger records with no file on disk.
    pub missing: Vec<String>,
    /// Ledger records whose file content no longer matches the recorded SQL.
    pub modified: Vec<String>,
    /// Filename of the most recently inserted record.
    pub latest: Option<String>,
    /// Sequence number the next authored script would receive.
    pub next_sequence: u32,
}
