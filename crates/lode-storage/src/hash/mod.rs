//! Extendible hashing.
//!
//! The buffer pool needs a page table that maps a `PageId` to the
//! frame currently caching it, with cheap point lookups and no global
//! rehash when the pool grows hot. [`ExtendibleHashTable`] provides
//! that: buckets split one at a time as they fill, and the directory
//! doubles only when a split outgrows it.

mod extendible;

pub use extendible::{ExtendibleHashTable, MAX_DEPTH};
