//! SQLite migration ledger and script applier.
//!
//! This crate tracks which `NNN_<name>.sql` scripts have been applied to a
//! SQLite database, applies the rest in filename order, and authors new
//! scripts from ad-hoc SQL. Every script runs in its own transaction
//! together with its ledger insert.
//!
//! # Architecture
//!
//! - **`schema`** — ledger table DDL with a validated table name
//! - **`ledger`** — [`Ledger`] storage and lookup of [`MigrationRecord`]s
//! - **`migration`** — [`Migrator`] bootstrap, apply-pending, create-and-apply, status
//! - **`connection`** — opening the database with configured pragmas
//!
//! # Quick start
//!
//! ```no_run
//! use sqlmig_core::MigrateConfig;
//! use sqlmig_sqlite::Migrator;
//!
//! let config = MigrateConfig::default();
//! let mut migrator = Migrator::from_config(&config).unwrap();
//! migrator.bootstrap().unwrap();
//! migrator.apply_pending().unwrap();
//!
//! let status = migrator.status().unwrap();
//! println!("{} applied, {} pending", status.applied.len(), status.pending.len());
//! ```

mod connection;
mod error;
mod ledger;
mod migration;
mod schema;

pub use connection::{apply_pragmas, open_connection};
pub use error::{MigrateError, Result};
pub use ledger::{Ledger, MigrationRecord, checksum};
pub use migration::{ApplyReport, MigrationStatus, Migrator};
pub use schema::generate_ledger_sql;
