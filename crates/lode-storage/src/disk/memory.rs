//! In-memory disk manager for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use lode_common::constants::PAGE_SIZE;
use lode_common::types::PageId;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager that keeps all pages in a hash map.
///
/// Behaves like [`super::FileDiskManager`] without touching the
/// filesystem: unwritten pages read as zeroes and deallocated pages
/// disappear. Intended for tests.
#[derive(Default)]
pub struct MemDiskManager {
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
    next_page_id: AtomicU64,
}

impl MemDiskManager {
    /// Creates an empty in-memory disk manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pages that have been written.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    fn check_buf(buf: &[u8]) -> DiskResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DiskError::bad_buffer(PAGE_SIZE, buf.len()));
        }
        Ok(())
    }
}

impl DiskManager for MemDiskManager {
    fn allocate_page(&self) -> DiskResult<PageId> {
        Ok(PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        self.pages.lock().remove(&page_id);
        Ok(())
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        Self::check_buf(buf)?;
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
        Self::check_buf(buf)?;
        self.pages.lock().insert(page_id, buf.to_vec());
        Ok(())
    }
}

impl std::fmt::Debug for MemDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemDiskManager")
            .field("pages", &self.page_count())
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}
