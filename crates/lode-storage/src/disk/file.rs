//! File-backed disk manager.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use lode_common::constants::PAGE_SIZE;
use lode_common::types::PageId;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager that stores every page in a single database file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. The underlying file
/// is wrapped in a mutex; reads and writes seek and transfer one page
/// at a time.
pub struct FileDiskManager {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The file path.
    path: PathBuf,
    /// The next page id to hand out.
    next_page_id: AtomicU64,
}

impl FileDiskManager {
    /// Opens (or creates) the database file at `path`.
    ///
    /// Page-id allocation resumes after the highest page the file
    /// already contains.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let next_page_id = len.div_ceil(PAGE_SIZE as u64);

        Ok(Self {
            file: Mutex::new(file),
            path,
            next_page_id: AtomicU64::new(next_page_id),
        })
    }

    /// Returns the path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_buf(buf: &[u8]) -> DiskResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DiskError::bad_buffer(PAGE_SIZE, buf.len()));
        }
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&self) -> DiskResult<PageId> {
        Ok(PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn deallocate_page(&self, _page_id: PageId) -> DiskResult<()> {
        // Page ids are not recycled; the slot in the file simply goes
        // cold until a compaction tool reclaims it.
        Ok(())
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        Self::check_buf(buf)?;
        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        // A page past the end of the file (freshly allocated, never
        // written) reads as all zeroes.
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                buf[filled..].fill(0);
                break;
            }
            filled += n;
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
        Self::check_buf(buf)?;
        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}
