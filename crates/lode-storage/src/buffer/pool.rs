//! Buffer pool manager.
//!
//! The pool mediates every page access between the access methods and
//! the disk manager. It keeps at most one in-memory copy per page,
//! pins frames while callers hold them, and writes dirty pages back
//! when their frame is reclaimed.
//!
//! One coarse mutex serializes every public operation, including the
//! disk I/O performed on a miss. Holding the lock across I/O is a
//! deliberate trade: no two threads can race to fault in or evict the
//! same page, at the cost of single-threaded miss handling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use lode_common::types::PageId;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{Frame, FrameId};
use super::replacer::LruReplacer;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::hash::ExtendibleHashTable;
use crate::wal::LogManager;

/// State guarded by the pool's mutex.
struct PoolCore {
    /// Array of frames, owned for the lifetime of the pool.
    frames: Vec<Arc<Frame>>,
    /// Page table: maps PageId -> FrameId.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames holding no page, ready for immediate reuse.
    free_list: VecDeque<FrameId>,
    /// Eviction candidates among the occupied, unpinned frames.
    replacer: LruReplacer<FrameId>,
}

/// The buffer pool manager.
///
/// Callers borrow frames through [`fetch_page`](Self::fetch_page) /
/// [`new_page`](Self::new_page) and must release them with
/// [`unpin_page`](Self::unpin_page); a frame is only eligible for
/// eviction once its pin count returns to zero. The returned
/// `Arc<Frame>` stays valid past unpin, but its contents may be
/// replaced by another page at any point after, so callers must not
/// touch it again.
pub struct BufferPoolManager {
    /// Fixed number of frames.
    pool_size: usize,
    inner: Mutex<PoolCore>,
    disk: Arc<dyn DiskManager>,
    /// When present, the log is made durable up to a frame's LSN
    /// before the frame is written back.
    log: Option<Arc<dyn LogManager>>,
    // Counters for statistics.
    fetch_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a buffer pool over the given disk manager.
    ///
    /// When `log` is `None`, logging is disabled.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<dyn DiskManager>,
        log: Option<Arc<dyn LogManager>>,
    ) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let frames: Vec<Arc<Frame>> = (0..config.pool_size)
            .map(|i| Arc::new(Frame::new(FrameId::new(i))))
            .collect();
        let free_list: VecDeque<FrameId> = (0..config.pool_size).map(FrameId::new).collect();

        Ok(Self {
            pool_size: config.pool_size,
            inner: Mutex::new(PoolCore {
                frames,
                page_table: ExtendibleHashTable::new(config.bucket_size),
                free_list,
                replacer: LruReplacer::new(),
            }),
            disk,
            log,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns true if the page is currently resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.get(&page_id).is_some()
    }

    /// Fetches the page with the given id, pinning its frame.
    ///
    /// On a hit the resident frame is pinned and returned. On a miss a
    /// frame is reclaimed from the free list or the replacer, its old
    /// occupant written back if dirty, and the requested page read
    /// from disk. Fails with [`BufferError::NoEvictableFrame`] when
    /// every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<Arc<Frame>> {
        let mut core = self.inner.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(frame_id) = core.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = Arc::clone(&core.frames[frame_id.index()]);
            frame.pin();
            // The frame may or may not be in the replacer (it is not
            // when the pin count was already positive).
            core.replacer.erase(frame_id);
            return Ok(frame);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = Self::take_victim(&mut core).ok_or(BufferError::NoEvictableFrame)?;
        let frame = Arc::clone(&core.frames[frame_id.index()]);

        self.retire_victim(&core, &frame)?;
        frame.reset();

        core.page_table.insert(page_id, frame_id);
        {
            let mut data = frame.write_data();
            self.disk.read_page(page_id, &mut data)?;
        }
        frame.set_page_id(page_id);
        frame.pin();

        trace!(%page_id, frame_id = frame_id.index(), "faulted page in");
        Ok(frame)
    }

    /// Releases one pin on the page, ORing `is_dirty` into its dirty
    /// flag.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero (a double unpin). When the pin count reaches zero
    /// the frame becomes an eviction candidate.
    ///
    /// Note that a clean unpin never clears a dirty flag set earlier.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let core = self.inner.lock();
        let Some(frame_id) = core.page_table.get(&page_id) else {
            return false;
        };
        let frame = &core.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            core.replacer.insert(frame_id);
        }
        true
    }

    /// Writes the page's current contents to disk.
    ///
    /// Returns `Ok(false)` if `page_id` is invalid or the page is not
    /// resident. The dirty flag stays set; a later eviction writes the
    /// page again.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        if !page_id.is_valid() {
            return Ok(false);
        }
        let core = self.inner.lock();
        let Some(frame_id) = core.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &core.frames[frame_id.index()];

        self.flush_log_for(frame)?;
        let data = frame.read_data();
        self.disk.write_page(page_id, &data)?;
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Writes every resident page to disk.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let core = self.inner.lock();
        for frame in &core.frames {
            let page_id = frame.page_id();
            if !page_id.is_valid() {
                continue;
            }
            self.flush_log_for(frame)?;
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Allocates a fresh page and pins a zeroed frame for it.
    ///
    /// Fails with [`BufferError::NoEvictableFrame`] when every frame
    /// is pinned. The new page id is available from the returned
    /// frame's [`Frame::page_id`].
    pub fn new_page(&self) -> BufferResult<Arc<Frame>> {
        let mut core = self.inner.lock();
        let frame_id = Self::take_victim(&mut core).ok_or(BufferError::NoEvictableFrame)?;
        let frame = Arc::clone(&core.frames[frame_id.index()]);

        let page_id = self.disk.allocate_page()?;
        self.retire_victim(&core, &frame)?;
        frame.reset();

        core.page_table.insert(page_id, frame_id);
        frame.set_page_id(page_id);
        frame.pin();

        trace!(%page_id, frame_id = frame_id.index(), "created page");
        Ok(frame)
    }

    /// Drops the page from the pool and deallocates it on disk.
    ///
    /// Returns `Ok(false)` if the page is resident and pinned. A page
    /// that is not resident at all is still deallocated and reported
    /// as deleted.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut core = self.inner.lock();
        if let Some(frame_id) = core.page_table.get(&page_id) {
            let frame = Arc::clone(&core.frames[frame_id.index()]);
            if frame.is_pinned() {
                return Ok(false);
            }
            core.page_table.remove(&page_id);
            core.replacer.erase(frame_id);
            frame.reset();
            core.free_list.push_back(frame_id);
        }
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> BufferPoolStats {
        let core = self.inner.lock();
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &core.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Picks a frame to repurpose: the free list first, then the
    /// replacer. `None` means every frame is pinned.
    fn take_victim(core: &mut PoolCore) -> Option<FrameId> {
        if let Some(frame_id) = core.free_list.pop_front() {
            return Some(frame_id);
        }
        core.replacer.victim()
    }

    /// Detaches the frame's current occupant: write back if dirty,
    /// then drop its page-table entry. A frame fresh off the free list
    /// has no occupant and passes through untouched.
    fn retire_victim(&self, core: &PoolCore, frame: &Frame) -> BufferResult<()> {
        let old_page_id = frame.page_id();
        if !old_page_id.is_valid() {
            return Ok(());
        }
        if frame.is_dirty() {
            self.flush_log_for(frame)?;
            let data = frame.read_data();
            self.disk.write_page(old_page_id, &data)?;
            self.flush_count.fetch_add(1, Ordering::Relaxed);
            trace!(page_id = %old_page_id, "wrote back dirty page before reuse");
        }
        core.page_table.remove(&old_page_id);
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Makes the log durable up to the frame's recorded LSN.
    fn flush_log_for(&self, frame: &Frame) -> BufferResult<()> {
        if let Some(log) = &self.log {
            let lsn = frame.lsn();
            if lsn.is_valid() {
                log.flush_until(lsn)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.pool_size)
            .field("pages_resident", &core.page_table.len())
            .field("free_frames", &core.free_list.len())
            .finish()
    }
}
