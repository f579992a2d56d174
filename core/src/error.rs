//! Error types for script naming, discovery, and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while naming, discovering, or configuring migration scripts.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Filesystem access failure, tagged with the offending path.
    #[error("I/O error at '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Migration name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid migration name '{0}': must match [a-zA-Z0-9_-]+")]
    InvalidName(String),

    /// The fixed-width sequence prefix has no room left.
    #[error("sequence number {0} does not fit the 3-digit migration prefix")]
    SequenceExhausted(u32),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
