//! Error types for random-access file operations

use thiserror::Error;

/// Broad classification of an [`IoError`].
///
/// Lets callers tell "the storage is broken" apart from "the data is
/// malformed" and "the API was called incorrectly".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failure reported by the underlying storage, including short reads at EOF
    Io,
    /// The request is structurally invalid for this handle or this data
    Corrupt,
    /// The API was used incorrectly (for example a closed handle was reused)
    Misuse,
}

/// Errors that can occur while reading or writing a [`RandomAccessFile`](crate::RandomAccessFile)
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error from the underlying storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read that must return an exact number of bytes reached end of file
    #[error("unexpected end of file at offset {offset} ({needed} bytes requested)")]
    UnexpectedEof {
        /// File position where the read started
        offset: u64,
        /// Number of bytes the caller asked for
        needed: usize,
    },

    /// Write attempted on a handle opened read-only
    #[error("{location} is open read-only")]
    ReadOnly {
        /// Location of the read-only handle
        location: String,
    },

    /// Encoded data could not be decoded (for example a malformed UTF string)
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Buffer size of zero or another unusable open parameter
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Handle used after it was closed
    #[error("handle for {location} used after close")]
    Closed {
        /// Location of the closed handle
        location: String,
    },
}

impl IoError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::UnexpectedEof { .. } => ErrorKind::Io,
            Self::ReadOnly { .. } | Self::InvalidData(_) => ErrorKind::Corrupt,
            Self::InvalidArgument(_) | Self::Closed { .. } => ErrorKind::Misuse,
        }
    }

    /// True for end-of-file conditions.
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

/// Result type alias for random-access file operations
pub type IoResult<T> = Result<T, IoError>;
