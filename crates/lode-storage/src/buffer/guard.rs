//! RAII page guard.
//!
//! A [`PageGuard`] keeps its page pinned and unpins it through the
//! pool when dropped, carrying the dirty flag along. It is a
//! convenience layer over the explicit
//! [`fetch_page`](super::BufferPoolManager::fetch_page) /
//! [`unpin_page`](super::BufferPoolManager::unpin_page) surface.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use lode_common::types::PageId;

use super::error::BufferResult;
use super::frame::Frame;
use super::BufferPoolManager;

/// A pinned page that unpins itself on drop.
///
/// Reading goes through [`data`](Self::data); any call to
/// [`data_mut`](Self::data_mut) marks the page dirty, and the drop
/// reports that to the pool.
pub struct PageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<Frame>,
    dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<Frame>) -> Self {
        Self {
            pool,
            frame,
            dirty: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    /// Returns a read-only view of the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable view of the page data, marking the page
    /// dirty.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.dirty = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page dirty without touching the data.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.frame.page_id(), self.dirty);
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl BufferPoolManager {
    /// Fetches a page and wraps it in a guard that unpins on drop.
    pub fn fetch_page_guarded(&self, page_id: PageId) -> BufferResult<PageGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageGuard::new(self, frame))
    }

    /// Creates a page and wraps it in a guard that unpins on drop.
    pub fn new_page_guarded(&self) -> BufferResult<PageGuard<'_>> {
        let frame = self.new_page()?;
        Ok(PageGuard::new(self, frame))
    }
}
