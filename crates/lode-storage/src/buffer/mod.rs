//! Buffer pool manager for LodeDB.
//!
//! The buffer pool caches fixed-size disk pages in a fixed number of
//! in-memory frames, so the rest of the engine can work on databases
//! much larger than memory without knowing which pages happen to be
//! resident. It provides:
//!
//! - **At most one copy per page**: the page table maps every resident
//!   page id to its frame
//! - **Pin counting**: a pinned frame is never reclaimed
//! - **Dirty tracking**: modified pages are written back when their
//!   frame is reused
//! - **LRU eviction**: unpinned frames queue up in insertion order
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  BufferPoolManager                      │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │                   Page Table                     │  │
//! │  │       ExtendibleHashTable<PageId, FrameId>       │  │
//! │  └──────────────────────────────────────────────────┘  │
//! │                          │                              │
//! │                          ▼                              │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │                  Frame Array                     │  │
//! │  │  ┌─────────┐ ┌─────────┐       ┌─────────┐       │  │
//! │  │  │ Frame 0 │ │ Frame 1 │  ...  │ Frame N │       │  │
//! │  │  │ page_id │ │ page_id │       │ page_id │       │  │
//! │  │  │ data[]  │ │ data[]  │       │ data[]  │       │  │
//! │  │  │ dirty   │ │ dirty   │       │ dirty   │       │  │
//! │  │  │ pin_cnt │ │ pin_cnt │       │ pin_cnt │       │  │
//! │  │  └─────────┘ └─────────┘       └─────────┘       │  │
//! │  └──────────────────────────────────────────────────┘  │
//! │               │                      │                  │
//! │               ▼                      ▼                  │
//! │  ┌─────────────────────┐  ┌─────────────────────┐      │
//! │  │      Free List      │  │    LRU Replacer     │      │
//! │  │   (empty frames)    │  │ (unpinned frames)   │      │
//! │  └─────────────────────┘  └─────────────────────┘      │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use lode_storage::buffer::{BufferPoolConfig, BufferPoolManager};
//! use lode_storage::disk::{DiskManager, MemDiskManager};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let disk = Arc::new(MemDiskManager::new()) as Arc<dyn DiskManager>;
//! let pool = BufferPoolManager::new(BufferPoolConfig::new(64), disk, None)?;
//!
//! let frame = pool.new_page()?;
//! let page_id = frame.page_id();
//! frame.write_data()[0] = 42;
//!
//! pool.unpin_page(page_id, true);
//! pool.flush_page(page_id)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod guard;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{Frame, FrameId};
pub use guard::PageGuard;
pub use pool::BufferPoolManager;
pub use replacer::LruReplacer;

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (required a disk read).
    pub misses: u64,
    /// Number of frames reclaimed from occupied pages.
    pub evictions: u64,
    /// Number of pages written back to disk.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_hit_ratio() {
        let mut stats = BufferPoolStats::default();
        assert_eq!(stats.hit_ratio(), 0.0);

        stats.fetches = 100;
        stats.hits = 80;
        assert!((stats.hit_ratio() - 0.8).abs() < f64::EPSILON);
    }
}
