//! Storage error types

use std::path::PathBuf;

/// Failure reading or writing persisted state
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backing file could not be read or written
    #[error("storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value is not valid JSON for the requested type
    #[error("stored value for '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend refuses writes (quota, read-only mount, disabled persistence)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Build an I/O error for `path`
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
