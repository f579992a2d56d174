//! Migration engine configuration.
//!
//! Defines the YAML-serializable settings that locate the database and the
//! scripts directory, name the ledger table, and set connection pragmas.
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! # Example YAML
//!
//! ```yaml
//! database: src/data/data.sqlite
//! migrations_dir: src/data/migrations
//! ledger_table: _migrations
//! pragmas:
//!   journal_mode: WAL
//!   foreign_keys: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Connection pragmas applied when the database is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PragmaConfig {
    /// SQLite journal mode (e.g. `WAL`, `DELETE`).
    pub journal_mode: String,
    /// Whether foreign key enforcement is enabled.
    pub foreign_keys: bool,
}

impl Default for PragmaConfig {
    fn default() -> Self {
        Self {
            journal_mode: "WAL".to_string(),
            foreign_keys: true,
        }
    }
}

/// Top-level migration configuration.
///
/// # Examples
///
/// ```
/// use sqlmig_core::MigrateConfig;
///
/// let config: MigrateConfig = serde_yaml::from_str("ledger_table: applied\n").unwrap();
/// assert_eq!(config.ledger_table, "applied");
/// assert_eq!(config.migrations_dir, MigrateConfig::default().migrations_dir);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Path of the SQLite database file.
    pub database: PathBuf,
    /// Directory holding `NNN_<name>.sql` scripts.
    pub migrations_dir: PathBuf,
    /// Name of the ledger table inside the database.
    pub ledger_table: String,
    /// Connection pragmas.
    pub pragmas: PragmaConfig,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("src/data/data.sqlite"),
            migrations_dir: PathBuf::from("src/data/migrations"),
            ledger_table: "_migrations".to_string(),
            pragmas: PragmaConfig::default(),
        }
    }
}

impl MigrateConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IoError`] if the file cannot be read, or
    /// [`CoreError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| CoreError::io(path, e))?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| CoreError::io(path, e))?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}
