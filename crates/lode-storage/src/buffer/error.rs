//! Buffer pool errors.

use std::io;

use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// Every frame is pinned; nothing can be evicted to make room.
    #[error("no evictable frame available, every page is pinned")]
    NoEvictableFrame,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The disk manager failed; the affected frame may be in an
    /// inconsistent state and the pool should be torn down.
    #[error("disk I/O failed: {source}")]
    Disk {
        #[from]
        source: DiskError,
    },

    /// The log manager failed to make the log durable.
    #[error("log flush failed: {source}")]
    Log {
        #[from]
        source: io::Error,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried
    /// once some caller unpins a page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoEvictableFrame)
    }
}
