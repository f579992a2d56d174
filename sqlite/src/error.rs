//! Error types for ledger and applier operations.
//!
//! The variants mirror the engine's failure modes: setup of the ledger or
//! scripts directory, execution of a script, a duplicate ledger entry, and
//! filesystem access.

use std::path::PathBuf;

use sqlmig_core::CoreError;
use thiserror::Error;

/// Errors that can occur while tracking or applying migrations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// The ledger table or the scripts directory could not be created.
    #[error("schema setup failed: {0}")]
    SchemaSetupError(String),

    /// A script's SQL failed; its transaction was rolled back.
    #[error("migration '{filename}' failed: {source}")]
    MigrationExecutionError {
        filename: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The filename is already recorded in the ledger (or present on disk
    /// when authoring a new script).
    #[error("migration '{0}' is already recorded")]
    DuplicateMigrationError(String),

    /// Reading or writing a script file failed.
    #[error("I/O error at '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger table name contains invalid characters.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// Script naming or configuration failure.
    #[error(transparent)]
    CoreError(CoreError),

    /// Any other SQLite failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

impl MigrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

impl From<CoreError> for MigrateError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::IoError { path, source } => Self::IoError { path, source },
            other => Self::CoreError(other),
        }
    }
}

/// Convenience alias for results with [`MigrateError`].
pub type Result<T> = std::result::Result<T, MigrateError>;
