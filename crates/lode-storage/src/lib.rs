//! # lode-storage
//!
//! The page-caching storage core for LodeDB.
//!
//! This crate implements the in-memory half of the storage engine:
//! - A buffer pool manager that caches fixed-size disk pages in a
//!   fixed number of frames, with pin counting, dirty tracking and
//!   LRU eviction
//! - An extendible hash table used by the buffer pool as its page
//!   table (page id to frame mapping)
//! - The disk-manager and log-manager contracts the pool consumes

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager, frames and eviction
pub mod buffer;

/// Disk manager contract and implementations
pub mod disk;

/// Extendible hashing
pub mod hash;

/// Log manager contract
pub mod wal;
