//! Error types for nlfe-io.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

/// Failures while exchanging data over a [`Channel`](crate::Channel).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("size mismatch: expected {expected} entries, received {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("message kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("tag mismatch: expected db tag {expected}, found {found}")]
    TagMismatch { expected: i32, found: i32 },

    #[error("channel exhausted while expecting {0}")]
    Exhausted(&'static str),
}

/// Failures while reading or writing checkpoint files.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaVersion { expected: u32, found: u32 },

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
