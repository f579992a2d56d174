//! Script naming, discovery, and configuration for the sqlmig engine.
//!
//! This crate holds the parts of the migration engine that never touch the
//! database:
//!
//! - [`MigrationScript`] and [`discover_scripts`] — finding `NNN_<name>.sql`
//!   files in the scripts directory, in sequence order.
//! - [`parse_sequence`], [`format_filename`], [`max_sequence`] — the
//!   fixed-width sequence prefix rules.
//! - [`MigrateConfig`] — YAML configuration for database path, scripts
//!   directory, ledger table, and pragmas.
//!
//! The ledger and the applier live in `sqlmig-sqlite`.

mod config;
mod error;
mod script;

pub use config::{MigrateConfig, PragmaConfig};
pub use error::{CoreError, Result};
pub use script::{
    MAX_SEQUENCE, MigrationScript, SCRIPT_EXTENSION, SEQUENCE_WIDTH, discover_scripts,
    format_filename, is_conforming, max_sequence, parse_sequence, validate_slug,
};
