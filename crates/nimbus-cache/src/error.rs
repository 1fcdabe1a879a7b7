//! Error types for the file handle cache

use nimbus_io::{ErrorKind, IoError};
use thiserror::Error;

/// Errors returned by [`FileCache`](crate::FileCache) operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Opening, syncing or closing the underlying file failed
    #[error(transparent)]
    Io(#[from] IoError),

    /// A cached handle was released but the cache holds no entry for it
    #[error("released handle for {location} is not tracked by this cache")]
    UntrackedRelease {
        /// Location of the released handle
        location: String,
    },

    /// A handle was released while its entry was not locked
    #[error("released handle for {location} was not locked")]
    NotLocked {
        /// Location of the released handle
        location: String,
    },

    /// The cache entry for a location belongs to a different handle
    #[error("released handle for {location} does not match the cached handle")]
    HandleMismatch {
        /// Location of the released handle
        location: String,
    },

    /// Configuration rejected by validation
    #[error("invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// The cache was created outside an async runtime
    #[error("cache requires a tokio runtime: {0}")]
    Runtime(String),
}

impl CacheError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(e) => e.kind(),
            Self::UntrackedRelease { .. }
            | Self::NotLocked { .. }
            | Self::HandleMismatch { .. }
            | Self::InvalidConfiguration(_)
            | Self::Runtime(_) => ErrorKind::Misuse,
        }
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
