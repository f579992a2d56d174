//! Migration script naming and discovery.
//!
//! A migration script is a file named `<NNN>_<slug>.sql`, where `NNN` is a
//! zero-padded, fixed-width sequence number. Because the prefix has a fixed
//! width, lexicographic filename order equals numeric sequence order, and
//! every ordering decision in this workspace relies on that.
//!
//! # Examples
//!
//! ```
//! use sqlmig_core::{format_filename, parse_sequence};
//!
//! let name = format_filename(8, "add_media_index").unwrap();
//! assert_eq!(name, "008_add_media_index.sql");
//! assert_eq!(parse_sequence(&name), Some(8));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

/// File extension every migration script carries.
pub const SCRIPT_EXTENSION: &str = ".sql";

/// Width of the zero-padded sequence prefix.
pub const SEQUENCE_WIDTH: usize = 3;

/// Largest sequence number that fits [`SEQUENCE_WIDTH`] digits.
pub const MAX_SEQUENCE: u32 = 999;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex must compile"));
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3}_[a-zA-Z0-9_-]+\.sql$").expect("static regex must compile")
});

/// A migration script found in the scripts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Bare filename, e.g. `"007_add_media_index.sql"`.
    pub filename: String,
    /// Parsed sequence prefix, if the filename starts with digits.
    pub sequence: Option<u32>,
    /// Full path to the script on disk.
    pub path: PathBuf,
}

impl MigrationScript {
    /// Reads the full script text.
    pub fn read_sql(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| CoreError::io(&self.path, e))
    }
}

/// Parses the leading sequence digits of a migration filename.
///
/// Returns `None` when the filename does not start with an ASCII digit or
/// the digits overflow `u32`.
pub fn parse_sequence(filename: &str) -> Option<u32> {
    let end = filename
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(filename.len());
    if end == 0 {
        return None;
    }
    filename[..end].parse().ok()
}

/// Checks that a migration name (the slug part of the filename) is valid.
pub fn validate_slug(name: &str) -> Result<()> {
    if SLUG_RE.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidName(name.to_string()))
    }
}

/// Builds `"<NNN>_<name>.sql"` for the given sequence number.
///
/// # Errors
///
/// Returns [`CoreError::SequenceExhausted`] if `sequence` is zero or exceeds
/// [`MAX_SEQUENCE`], and [`CoreError::InvalidName`] if `name` is not a valid
/// slug.
pub fn format_filename(sequence: u32, name: &str) -> Result<String> {
    if sequence == 0 || sequence > MAX_SEQUENCE {
        return Err(CoreError::SequenceExhausted(sequence));
    }
    validate_slug(name)?;
    Ok(format!(
        "{sequence:0width$}_{name}{SCRIPT_EXTENSION}",
        width = SEQUENCE_WIDTH
    ))
}

/// Returns `true` if `filename` fully matches `NNN_<slug>.sql`.
pub fn is_conforming(filename: &str) -> bool {
    FILENAME_RE.is_match(filename)
}

/// Returns the largest sequence prefix among `filenames`.
pub fn max_sequence<'a, I>(filenames: I) -> Option<u32>
where
    I: IntoIterator<Item = &'a str>,
{
    filenames.into_iter().filter_map(parse_sequence).max()
}

/// Lists every `.sql` file in `dir`, sorted by filename.
///
/// Scripts whose names do not follow the `NNN_<slug>.sql` convention are
/// still returned in lexicographic position, with a warning. Entries whose
/// names are not valid UTF-8 are skipped.
///
/// # Errors
///
/// Returns [`CoreError::IoError`] if the directory cannot be read.
pub fn discover_scripts(dir: impl AsRef<Path>) -> Result<Vec<MigrationScript>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str().map(String::from) else {
            warn!(path = %entry.path().display(), "skipping script with non-UTF-8 name");
            continue;
        };
        if !filename.ends_with(SCRIPT_EXTENSION) || filename.starts_with('.') {
            continue;
        }
        if !is_conforming(&filename) {
            warn!(%filename, "script name does not follow NNN_<name>.sql");
        }
        scripts.push(MigrationScript {
            sequence: parse_sequence(&filename),
            path: entry.path(),
            filename,
        });
    }

    scripts.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!(dir = %dir.display(), count = scripts.len(), "discovered migration scripts");
    Ok(scripts)
}
