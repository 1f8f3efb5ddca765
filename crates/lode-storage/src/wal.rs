//! The log-manager contract the buffer pool consumes.

use std::io;

use lode_common::types::Lsn;

/// Write-ahead-log hook for the buffer pool.
///
/// Before a dirty frame is written back, the pool asks the log manager
/// to make the log durable up to the frame's recorded LSN, so that no
/// page ever reaches disk ahead of the log records that produced it.
/// When the pool is built without a log manager, logging is disabled.
pub trait LogManager: Send + Sync {
    /// Blocks until every log record with an LSN at or below `lsn` is
    /// durable.
    fn flush_until(&self, lsn: Lsn) -> io::Result<()>;
}
