//! Error types for disk management.

use std::io;

use thiserror::Error;

/// Result type for disk-manager operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur while moving pages to and from storage.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Short read/write (less data than a full page).
    #[error("short {operation}: expected {expected} bytes, got {actual}")]
    ShortIo {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The caller's buffer is not exactly one page long.
    #[error("bad page buffer: expected {expected} bytes, got {actual}")]
    BadBufferSize { expected: usize, actual: usize },
}

impl DiskError {
    /// Creates a `ShortIo` error for writes.
    pub fn short_write(expected: usize, actual: usize) -> Self {
        Self::ShortIo {
            operation: "write",
            expected,
            actual,
        }
    }

    /// Creates a `BadBufferSize` error.
    pub fn bad_buffer(expected: usize, actual: usize) -> Self {
        Self::BadBufferSize { expected, actual }
    }
}
