//! Error types for stravacache.
//!
//! Cache operations never return these to callers; they are logged and
//! degraded to a miss or a skipped write. Configuration loading and the
//! internal record helpers do propagate them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the cache and its configuration layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure while touching a record or the storage root.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record or config file could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A file name in the storage root is not a record location.
    #[error("Not a cache record location: {0}")]
    InvalidLocation(String),
}

impl CacheError {
    /// Wrap an `io::Error` with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
