//! Unix `compress` (`.Z`) decompression.
//!
//! The format is a 3-byte header followed by variable-width LZW codes:
//!
//! ```text
//! +------+------+-------+------------------------------+
//! | 0x1F | 0x9D | flags | codes, 9..=max_bits wide ... |
//! +------+------+-------+------------------------------+
//! flags: bit 7 block mode, bits 5-6 reserved, bits 0-4 max_bits
//! ```
//!
//! Only decompression is provided.

mod decoder;
mod error;
mod header;

pub use decoder::{CLEAR, FIRST, LzwDecoder};
pub use error::{LzwError, LzwResult};
pub use header::{
    BLOCK_MODE, HDR_EXTENDED, HDR_FREE, HDR_MAXBITS, HEADER_SIZE, INIT_BITS, LZW_MAGIC, LzwHeader,
    MAX_BITS,
};

/// Maximum allowed decompression size (1 GB)
///
/// Bounds memory for [`decompress`]. Streaming through [`LzwDecoder`] has no
/// limit.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Decompress a complete `.Z` stream held in memory.
pub fn decompress(data: &[u8]) -> LzwResult<Vec<u8>> {
    decompress_with_limit(data, MAX_DECOMPRESSION_SIZE)
}

pub(crate) fn decompress_with_limit(data: &[u8], limit: usize) -> LzwResult<Vec<u8>> {
    let mut decoder = LzwDecoder::new(data)?;
    let mut decompressed = Vec::with_capacity(data.len().saturating_mul(3).min(limit));

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.decode_chunk(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > limit {
            return Err(LzwError::SizeLimit { limit });
        }
        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decompress_literals() {
        let data = [0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00];
        assert_eq!(decompress(&data).unwrap(), b"ab");
    }

    #[test]
    fn test_decompress_limit() {
        let data = [0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00];
        assert!(matches!(
            decompress_with_limit(&data, 1),
            Err(LzwError::SizeLimit { limit: 1 })
        ));
    }

    #[test]
    fn test_decompress_not_lzw() {
        assert!(matches!(
            decompress(b"CDF\x01"),
            Err(LzwError::InvalidMagic(0x4344))
        ));
    }
}
