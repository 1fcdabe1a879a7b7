//! Shared cache of open random-access files.
//!
//! Readers of large archives reopen the same files over and over. A
//! [`FileCache`] keeps recently used [`nimbus_io::RandomAccessFile`] handles
//! open, hands each one to a single caller at a time, and closes the least
//! recently used ones when it grows past its bounds.
//!
//! - [`FileCache::acquire`] locks and returns a cached handle, or opens one
//! - [`FileCache::release`] parks it again for the next caller
//! - a background sweep on the tokio runtime trims idle entries
//!
//! Caching is off until [`FileCache::init`] is called; [`FileCache::exit`]
//! closes everything on shutdown.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod file_cache;

pub use config::FileCacheConfig;
pub use error::{CacheError, CacheResult};
pub use file_cache::{CacheStats, EntrySnapshot, FileCache, FileHandle};
