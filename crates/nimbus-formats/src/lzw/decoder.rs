//! Streaming LZW decoder.
//!
//! Codes are packed least-significant bit first. The encoder emits them in
//! groups of eight codes of equal width, so whenever the width changes or the
//! table is cleared the bit position jumps to the next group boundary before
//! the next code is read.

use std::io::{self, Read};

use tracing::debug;

use super::error::{LzwError, LzwResult};
use super::header::{HEADER_SIZE, INIT_BITS, LzwHeader};

/// Table reset code in block mode
pub const CLEAR: usize = 256;
/// First free table entry in block mode
pub const FIRST: usize = 257;

/// Refill the input buffer when fewer bytes than this are pending
const EXTRA: usize = 64;
/// Input buffer size
const INPUT_BUFFER_SIZE: usize = 10_000;

/// Decoder for the Unix `compress` (`.Z`) format.
///
/// Wraps any [`Read`] and yields the decompressed bytes through [`Read`].
/// The header is parsed by [`LzwDecoder::new`]; everything else is decoded
/// lazily as output is requested.
///
/// ```
/// use nimbus_formats::lzw::LzwDecoder;
/// use std::io::Read;
///
/// // "ab" compressed with 9-bit block-mode codes
/// let compressed = [0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00];
/// let mut decoder = LzwDecoder::new(&compressed[..])?;
/// let mut text = String::new();
/// decoder.read_to_string(&mut text)?;
/// assert_eq!(text, "ab");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LzwDecoder<R> {
    inner: R,
    header: LzwHeader,
    /// Code table size at full width
    table_size: usize,

    n_bits: u32,
    max_code: usize,
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    free_entry: usize,
    old_code: Option<usize>,
    fin_char: u8,
    /// Decoded bytes waiting to be handed out, last byte first
    stack: Vec<u8>,

    data: Box<[u8]>,
    end: usize,
    got: usize,
    bit_pos: usize,

    eof: bool,
    poisoned: bool,
}

impl<R: Read> LzwDecoder<R> {
    /// Read and validate the header, then prepare to decode.
    pub fn new(mut inner: R) -> LzwResult<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        inner.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                LzwError::InvalidHeader(format!("stream shorter than {HEADER_SIZE} header bytes"))
            } else {
                LzwError::Io(e)
            }
        })?;
        let header = LzwHeader::parse(bytes)?;
        debug!(
            "LZW stream: max_bits={}, block_mode={}",
            header.max_bits, header.block_mode
        );

        let table_size = header.table_size();
        let mut suffix = vec![0u8; table_size];
        for (i, s) in suffix.iter_mut().take(256).enumerate() {
            *s = i as u8;
        }

        Ok(Self {
            inner,
            header,
            table_size,
            n_bits: u32::from(INIT_BITS),
            max_code: Self::max_code_for(u32::from(INIT_BITS), header, table_size),
            prefix: vec![0u16; table_size],
            suffix,
            free_entry: if header.block_mode { FIRST } else { CLEAR },
            old_code: None,
            fin_char: 0,
            stack: Vec::with_capacity(table_size),
            data: vec![0u8; INPUT_BUFFER_SIZE].into_boxed_slice(),
            end: 0,
            got: 0,
            bit_pos: 0,
            eof: false,
            poisoned: false,
        })
    }

    /// The parsed stream header.
    pub const fn header(&self) -> LzwHeader {
        self.header
    }

    /// Give back the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn max_code_for(n_bits: u32, header: LzwHeader, table_size: usize) -> usize {
        if n_bits == u32::from(header.max_bits) {
            table_size
        } else {
            (1 << n_bits) - 1
        }
    }

    fn fill(&mut self) -> LzwResult<()> {
        let want = self.data.len() - 1 - self.end;
        let n = loop {
            match self.inner.read(&mut self.data[self.end..self.end + want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };
        self.got = n;
        self.end += n;
        Ok(())
    }

    /// Drop fully consumed bytes from the front of the input buffer.
    fn reset_buffer(&mut self) {
        let consumed = (self.bit_pos >> 3).min(self.end);
        self.data.copy_within(consumed..self.end, 0);
        self.end -= consumed;
        self.bit_pos = 0;
    }

    /// Skip to the end of the current group of eight codes.
    fn align(&mut self) {
        if self.bit_pos == 0 {
            return;
        }
        let group = (self.n_bits as usize) << 3;
        self.bit_pos = (self.bit_pos - 1) + group - ((self.bit_pos - 1 + group) % group);
    }

    fn next_code(&mut self) -> usize {
        let p = self.bit_pos >> 3;
        let byte = |i: usize| usize::from(self.data.get(i).copied().unwrap_or(0));
        let raw = byte(p) | (byte(p + 1) << 8) | (byte(p + 2) << 16);
        let code = (raw >> (self.bit_pos & 7)) & ((1 << self.n_bits) - 1);
        self.bit_pos += self.n_bits as usize;
        code
    }

    fn widen(&mut self) -> LzwResult<()> {
        self.align();
        self.n_bits += 1;
        if self.n_bits > u32::from(self.header.max_bits) {
            return Err(LzwError::CodeWidthOverflow {
                bits: self.n_bits,
                max_bits: self.header.max_bits,
            });
        }
        self.max_code = Self::max_code_for(self.n_bits, self.header, self.table_size);
        debug!("LZW code width now {} bits", self.n_bits);
        self.reset_buffer();
        Ok(())
    }

    fn clear_table(&mut self) {
        self.prefix.fill(0);
        self.free_entry = CLEAR;
        self.align();
        self.n_bits = u32::from(INIT_BITS);
        self.max_code = Self::max_code_for(self.n_bits, self.header, self.table_size);
        debug!("LZW table cleared");
        self.reset_buffer();
    }

    fn drain_stack(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.stack.pop() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// At end of input anything left must be zero padding shorter than a
    /// byte. More means the last code was cut off.
    ///
    /// A cut that leaves fewer than 8 bits, all zero, looks exactly like
    /// padding and goes unnoticed. With 9-bit codes that happens when the
    /// stream loses its last byte and the cut code had its low 7 bits clear.
    fn check_trailing_bits(&self) -> LzwResult<()> {
        let leftover_bits = (self.end << 3).saturating_sub(self.bit_pos);
        if leftover_bits >= 8 {
            return Err(LzwError::Truncated { leftover_bits });
        }
        if leftover_bits > 0 {
            let pad = self.data[self.bit_pos >> 3] >> (self.bit_pos & 7);
            if pad != 0 {
                return Err(LzwError::Truncated { leftover_bits });
            }
        }
        Ok(())
    }

    fn decode_into(&mut self, out: &mut [u8]) -> LzwResult<usize> {
        let mut written = self.drain_stack(out);
        if written == out.len() || self.eof {
            return Ok(written);
        }

        'main: loop {
            if self.end < EXTRA {
                self.fill()?;
            }

            let n = self.n_bits as usize;
            let bit_in = if self.got > 0 {
                (self.end - self.end % n) << 3
            } else {
                (self.end << 3).saturating_sub(n - 1)
            };

            while self.bit_pos < bit_in {
                if written == out.len() {
                    return Ok(written);
                }

                if self.free_entry > self.max_code {
                    self.widen()?;
                    continue 'main;
                }

                let code = self.next_code();

                let Some(old_code) = self.old_code else {
                    if code >= CLEAR {
                        return Err(LzwError::CorruptCode {
                            code,
                            free_entry: self.free_entry,
                        });
                    }
                    self.old_code = Some(code);
                    self.fin_char = code as u8;
                    out[written] = self.fin_char;
                    written += 1;
                    continue;
                };

                if code == CLEAR && self.header.block_mode {
                    self.clear_table();
                    continue 'main;
                }

                let in_code = code;
                let mut code = code;

                // KwK: the code being defined by this very step
                if code >= self.free_entry {
                    if code > self.free_entry {
                        return Err(LzwError::CorruptCode {
                            code,
                            free_entry: self.free_entry,
                        });
                    }
                    self.stack.push(self.fin_char);
                    code = old_code;
                }

                let mut steps = 0;
                while code >= CLEAR {
                    self.stack.push(self.suffix[code]);
                    code = usize::from(self.prefix[code]);
                    steps += 1;
                    if steps > self.table_size {
                        return Err(LzwError::CorruptCode {
                            code: in_code,
                            free_entry: self.free_entry,
                        });
                    }
                }
                self.fin_char = self.suffix[code];
                self.stack.push(self.fin_char);

                written += self.drain_stack(&mut out[written..]);

                if self.free_entry < self.table_size {
                    self.prefix[self.free_entry] = old_code as u16;
                    self.suffix[self.free_entry] = self.fin_char;
                    self.free_entry += 1;
                }
                self.old_code = Some(in_code);
            }

            if self.got == 0 {
                self.check_trailing_bits()?;
                self.eof = true;
                return Ok(written);
            }
            self.reset_buffer();
        }
    }
}

impl<R: Read> LzwDecoder<R> {
    /// Like [`Read::read`] but with the typed error.
    ///
    /// After an error every further call fails with [`LzwError::Poisoned`].
    pub fn decode_chunk(&mut self, buf: &mut [u8]) -> LzwResult<usize> {
        if self.poisoned {
            return Err(LzwError::Poisoned);
        }
        self.decode_into(buf).inspect_err(|_| self.poisoned = true)
    }
}

impl<R: Read> Read for LzwDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.decode_chunk(buf)?)
    }
}

impl<R> std::fmt::Debug for LzwDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzwDecoder")
            .field("header", &self.header)
            .field("n_bits", &self.n_bits)
            .field("free_entry", &self.free_entry)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Pack 9-bit codes LSB first after a block-mode, 16-bit header.
    fn pack9(codes: &[u16]) -> Vec<u8> {
        let mut out = vec![0x1f, 0x9d, 0x90];
        let mut acc = 0u32;
        let mut bits = 0;
        for &code in codes {
            acc |= u32::from(code) << bits;
            bits += 9;
            while bits >= 8 {
                out.push(acc as u8);
                acc >>= 8;
                bits -= 8;
            }
        }
        if bits > 0 {
            out.push(acc as u8);
        }
        out
    }

    fn decode_all(data: &[u8]) -> LzwResult<Vec<u8>> {
        let mut decoder = LzwDecoder::new(data)?;
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_literal_codes() {
        let data = pack9(&[u16::from(b'a'), u16::from(b'b')]);
        assert_eq!(data, vec![0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00]);
        assert_eq!(decode_all(&data).unwrap(), b"ab");
    }

    #[test]
    fn test_kwk_code() {
        // "a", then entry 257 ("aa") used before it is complete
        let data = pack9(&[u16::from(b'a'), 257, 257]);
        assert_eq!(decode_all(&data).unwrap(), b"aaaaa");
    }

    #[test]
    fn test_code_beyond_table_is_corrupt() {
        let data = pack9(&[u16::from(b'a'), 300]);
        let err = LzwDecoder::new(&data[..])
            .unwrap()
            .read_to_end(&mut Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_first_code_must_be_literal() {
        let data = pack9(&[CLEAR as u16, u16::from(b'a')]);
        assert!(decode_all(&data).is_err());
    }

    #[test]
    fn test_poisoned_after_error() {
        let data = pack9(&[u16::from(b'a'), 400]);
        let mut decoder = LzwDecoder::new(&data[..]).unwrap();
        let mut buf = [0u8; 16];
        assert!(decoder.read(&mut buf).is_err());
        let err = decoder.read(&mut buf).unwrap_err();
        assert!(err.to_string().contains("earlier error"));
    }

    #[test]
    fn test_cut_code_with_data_bits_is_truncated() {
        let data = pack9(&[u16::from(b'a'), u16::from(b'b')]);
        assert!(matches!(
            crate::lzw::decompress(&data[..data.len() - 1]),
            Err(LzwError::Truncated { leftover_bits: 7 })
        ));
    }

    #[test]
    fn test_cut_code_with_zero_bits_reads_as_padding() {
        // 0x80 leaves only zero bits in the second byte
        let data = pack9(&[u16::from(b'a'), 0x80]);
        assert_eq!(crate::lzw::decompress(&data).unwrap(), [b'a', 0x80]);
        assert_eq!(crate::lzw::decompress(&data[..data.len() - 1]).unwrap(), b"a");
    }

    #[test]
    fn test_empty_body() {
        let data = [0x1f, 0x9d, 0x90];
        assert!(decode_all(&data).unwrap().is_empty());
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            LzwDecoder::new(&[0x1f, 0x9d][..]),
            Err(LzwError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_align_to_group_boundary() {
        let mut decoder = LzwDecoder::new(&[0x1f, 0x9d, 0x90][..]).unwrap();
        decoder.bit_pos = 0;
        decoder.align();
        assert_eq!(decoder.bit_pos, 0);

        decoder.bit_pos = 9;
        decoder.align();
        assert_eq!(decoder.bit_pos, 72);

        decoder.bit_pos = 72;
        decoder.align();
        assert_eq!(decoder.bit_pos, 72);
    }
}
