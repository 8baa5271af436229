//! Error types for the store module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during local file operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file ended before the expected number of bytes were read.
    #[error("unexpected end of file {}: wanted {wanted} more bytes", path.display())]
    Truncated { path: PathBuf, wanted: usize },

    /// I/O error on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fault injected by a test store.
    #[error("injected fault on {}: {reason}", path.display())]
    Injected { path: PathBuf, reason: String },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
