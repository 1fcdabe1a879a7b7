//! Three-byte `compress` header

use super::error::{LzwError, LzwResult};

/// Magic number at the start of every `.Z` stream
pub const LZW_MAGIC: u16 = 0x1F9D;

/// Header size in bytes
pub const HEADER_SIZE: usize = 3;

/// Mask for the maximum code width in the flag byte
pub const HDR_MAXBITS: u8 = 0x1F;
/// Header extension bit (never set by real encoders)
pub const HDR_EXTENDED: u8 = 0x20;
/// Reserved bit
pub const HDR_FREE: u8 = 0x40;
/// Block mode: code 256 clears the table
pub const BLOCK_MODE: u8 = 0x80;

/// Initial code width
pub const INIT_BITS: u8 = 9;
/// Widest code any encoder produces
pub const MAX_BITS: u8 = 16;

/// Parsed stream header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwHeader {
    /// Maximum code width in bits (9..=16)
    pub max_bits: u8,
    /// Code 256 resets the table
    pub block_mode: bool,
}

impl LzwHeader {
    /// Parse and validate the header bytes.
    pub fn parse(bytes: [u8; HEADER_SIZE]) -> LzwResult<Self> {
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        if magic != LZW_MAGIC {
            return Err(LzwError::InvalidMagic(magic));
        }

        let flags = bytes[2];
        if flags & (HDR_EXTENDED | HDR_FREE) != 0 {
            return Err(LzwError::ReservedBits(flags));
        }

        let max_bits = flags & HDR_MAXBITS;
        if !(INIT_BITS..=MAX_BITS).contains(&max_bits) {
            return Err(LzwError::UnsupportedMaxBits(max_bits));
        }

        Ok(Self {
            max_bits,
            block_mode: flags & BLOCK_MODE != 0,
        })
    }

    /// Header bytes for this configuration.
    pub const fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = LZW_MAGIC.to_be_bytes();
        let mode = if self.block_mode { BLOCK_MODE } else { 0 };
        [hi, lo, self.max_bits | mode]
    }

    /// Number of table entries at full width.
    pub const fn table_size(self) -> usize {
        1 << self.max_bits
    }
}
