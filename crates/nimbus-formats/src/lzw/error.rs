//! LZW error types

use nimbus_io::ErrorKind;
use thiserror::Error;

/// Errors raised while decoding a Unix `compress` stream
#[derive(Debug, Error)]
pub enum LzwError {
    /// First two bytes are not `1F 9D`
    #[error("invalid LZW magic: expected 0x1F9D, got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Header flag byte has the extension or reserved bit set
    #[error("reserved header bits set in flag byte 0x{0:02X}")]
    ReservedBits(u8),

    /// Maximum code width outside 9..=16
    #[error("unsupported maximum code width: {0} bits")]
    UnsupportedMaxBits(u8),

    /// Header could not be read
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Code refers past the next free table entry, or loops in the table
    #[error("corrupt LZW code {code} (next free entry {free_entry})")]
    CorruptCode {
        /// Offending code
        code: usize,
        /// Next free table slot when the code was read
        free_entry: usize,
    },

    /// Code width grew past the header's maximum
    #[error("code width {bits} exceeds maximum of {max_bits} bits")]
    CodeWidthOverflow {
        /// Width the stream asked for
        bits: u32,
        /// Width allowed by the header
        max_bits: u8,
    },

    /// Input ended partway through a code
    #[error("truncated LZW stream ({leftover_bits} unused bits at end of input)")]
    Truncated {
        /// Bits left over after the last complete code
        leftover_bits: usize,
    },

    /// Output grew past the allowed size
    #[error("decompressed size exceeds limit of {limit} bytes")]
    SizeLimit {
        /// The limit in bytes
        limit: usize,
    },

    /// Decoder used again after it reported an error
    #[error("decoder stopped after an earlier error")]
    Poisoned,

    /// I/O error from the compressed source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LzwError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Poisoned => ErrorKind::Misuse,
            Self::InvalidMagic(_)
            | Self::ReservedBits(_)
            | Self::UnsupportedMaxBits(_)
            | Self::InvalidHeader(_)
            | Self::CorruptCode { .. }
            | Self::CodeWidthOverflow { .. }
            | Self::Truncated { .. }
            | Self::SizeLimit { .. } => ErrorKind::Corrupt,
        }
    }
}

impl From<LzwError> for std::io::Error {
    fn from(err: LzwError) -> Self {
        match err {
            LzwError::Io(e) => e,
            LzwError::Truncated { .. } => Self::new(std::io::ErrorKind::UnexpectedEof, err),
            other => Self::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type alias for LZW operations
pub type LzwResult<T> = Result<T, LzwError>;
