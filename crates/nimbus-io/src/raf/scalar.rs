//! Typed reads and writes layered on the byte primitives.
//!
//! Reads assemble values one byte at a time through `read_byte` and decode
//! them in the handle's byte order. Writes emit big-endian bytes through
//! `write_u8` regardless of that setting.

use super::RandomAccessFile;
use crate::byte_order::{
    decode_f32, decode_f64, decode_i16, decode_i32, decode_i64, decode_u16, decode_u32,
    decode_u64,
};
use crate::error::{IoError, IoResult};

/// Longest body `write_utf` can describe with its u16 length prefix.
const MAX_UTF_LEN: usize = u16::MAX as usize;

macro_rules! scalar_reads {
    ($($name:ident -> $ty:ty, $n:expr, $decode:ident);* $(;)?) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` in the handle's byte order.")]
            pub fn $name(&mut self) -> IoResult<$ty> {
                let bytes = self.read_array::<$n>()?;
                Ok($decode(bytes, self.order))
            }
        )*
    };
}

macro_rules! bulk_reads {
    ($($name:ident -> $ty:ty, $n:expr, $decode:ident);* $(;)?) => {
        $(
            #[doc = concat!("Fill `dst` with `", stringify!($ty), "` values in the handle's byte order.")]
            pub fn $name(&mut self, dst: &mut [$ty]) -> IoResult<()> {
                let mut raw = vec![0u8; dst.len() * $n];
                self.read_fully(&mut raw)?;
                for (value, chunk) in dst.iter_mut().zip(raw.chunks_exact($n)) {
                    let mut bytes = [0u8; $n];
                    bytes.copy_from_slice(chunk);
                    *value = $decode(bytes, self.order);
                }
                Ok(())
            }
        )*
    };
}

macro_rules! slice_writes {
    ($($name:ident, $single:ident, $ty:ty);* $(;)?) => {
        $(
            #[doc = concat!("Write every `", stringify!($ty), "` in `values`, big-endian.")]
            pub fn $name(&mut self, values: &[$ty]) -> IoResult<()> {
                for &value in values {
                    self.$single(value)?;
                }
                Ok(())
            }
        )*
    };
}

impl RandomAccessFile {
    fn read_array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let offset = self.file_position;
        let mut bytes = [0u8; N];
        for b in &mut bytes {
            *b = self
                .read_byte()?
                .ok_or(IoError::UnexpectedEof { offset, needed: N })?;
        }
        Ok(bytes)
    }

    /// Read one byte as a boolean (non-zero is `true`).
    pub fn read_bool(&mut self) -> IoResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read one unsigned byte. End of file is an error.
    pub fn read_u8(&mut self) -> IoResult<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    /// Read one signed byte.
    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_u8()?.cast_signed())
    }

    scalar_reads! {
        read_u16 -> u16, 2, decode_u16;
        read_i16 -> i16, 2, decode_i16;
        read_u32 -> u32, 4, decode_u32;
        read_i32 -> i32, 4, decode_i32;
        read_u64 -> u64, 8, decode_u64;
        read_i64 -> i64, 8, decode_i64;
        read_f32 -> f32, 4, decode_f32;
        read_f64 -> f64, 8, decode_f64;
    }

    bulk_reads! {
        read_i16_into -> i16, 2, decode_i16;
        read_i32_into -> i32, 4, decode_i32;
        read_i64_into -> i64, 8, decode_i64;
        read_f32_into -> f32, 4, decode_f32;
        read_f64_into -> f64, 8, decode_f64;
    }

    /// Read bytes up to a newline or end of file, one char per byte.
    ///
    /// The newline is consumed and not returned; a carriage return is kept.
    /// Returns `None` when end of file is reached before any byte.
    pub fn read_line(&mut self) -> IoResult<Option<String>> {
        let mut line = String::new();
        loop {
            match self.read_byte()? {
                Some(b'\n') => return Ok(Some(line)),
                Some(b) => line.push(char::from(b)),
                None if line.is_empty() => return Ok(None),
                None => return Ok(Some(line)),
            }
        }
    }

    /// Read exactly `n` bytes as a string. Invalid UTF-8 is replaced.
    pub fn read_string(&mut self, n: usize) -> IoResult<String> {
        let bytes = self.read_bytes(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a u16 length prefix then that many bytes of modified UTF-8.
    pub fn read_utf(&mut self) -> IoResult<String> {
        let len = self.read_u16()?;
        let body = self.read_bytes(usize::from(len))?;
        decode_modified_utf8(&body)
    }

    /// Write one signed byte.
    pub fn write_i8(&mut self, value: i8) -> IoResult<()> {
        self.write_u8(value.cast_unsigned())
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) -> IoResult<()> {
        self.write_u8(u8::from(value))
    }

    fn write_array(&mut self, bytes: &[u8]) -> IoResult<()> {
        for &b in bytes {
            self.write_u8(b)?;
        }
        Ok(())
    }

    /// Write a `u16`, big-endian.
    pub fn write_u16(&mut self, value: u16) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write an `i16`, big-endian.
    pub fn write_i16(&mut self, value: i16) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write a `u32`, big-endian.
    pub fn write_u32(&mut self, value: u32) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write an `i32`, big-endian.
    pub fn write_i32(&mut self, value: i32) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write a `u64`, big-endian.
    pub fn write_u64(&mut self, value: u64) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write an `i64`, big-endian.
    pub fn write_i64(&mut self, value: i64) -> IoResult<()> {
        self.write_array(&value.to_be_bytes())
    }

    /// Write an `f32` bit pattern, big-endian.
    pub fn write_f32(&mut self, value: f32) -> IoResult<()> {
        self.write_array(&value.to_bits().to_be_bytes())
    }

    /// Write an `f64` bit pattern, big-endian.
    pub fn write_f64(&mut self, value: f64) -> IoResult<()> {
        self.write_array(&value.to_bits().to_be_bytes())
    }

    slice_writes! {
        write_i16_slice, write_i16, i16;
        write_i32_slice, write_i32, i32;
        write_i64_slice, write_i64, i64;
        write_f32_slice, write_f32, f32;
        write_f64_slice, write_f64, f64;
    }

    /// Write the low byte of each UTF-16 unit of `s`.
    pub fn write_str_bytes(&mut self, s: &str) -> IoResult<()> {
        for unit in s.encode_utf16() {
            self.write_u8(unit as u8)?;
        }
        Ok(())
    }

    /// Write each UTF-16 unit of `s` as two big-endian bytes.
    pub fn write_chars(&mut self, s: &str) -> IoResult<()> {
        for unit in s.encode_utf16() {
            self.write_u16(unit)?;
        }
        Ok(())
    }

    /// Write a u16 length prefix then `s` in modified UTF-8.
    pub fn write_utf(&mut self, s: &str) -> IoResult<()> {
        let body = encode_modified_utf8(s);
        let len = u16::try_from(body.len()).map_err(|_| {
            IoError::InvalidArgument(format!(
                "encoded string is {} bytes, limit is {MAX_UTF_LEN}",
                body.len()
            ))
        })?;
        self.write_u16(len)?;
        self.write_array(&body)
    }
}

/// Modified UTF-8: UTF-16 units encoded individually, NUL as two bytes.
fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0080..=0x07FF | 0 => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn decode_modified_utf8(bytes: &[u8]) -> IoResult<String> {
    let malformed = |at: usize| IoError::InvalidData(format!("malformed modified UTF-8 at byte {at}"));
    let continuation = |at: usize| -> IoResult<u16> {
        match bytes.get(at) {
            Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
            _ => Err(malformed(at)),
        }
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0x0..=0x7 => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC | 0xD => {
                units.push((u16::from(b & 0x1F) << 6) | continuation(i + 1)?);
                i += 2;
            }
            0xE => {
                units.push(
                    (u16::from(b & 0x0F) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?,
                );
                i += 3;
            }
            _ => return Err(malformed(i)),
        }
    }
    String::from_utf16(&units).map_err(|_| IoError::InvalidData("unpaired surrogate in string".to_string()))
}
