//! Positional storage backends for [`RandomAccessFile`](crate::RandomAccessFile).
//!
//! The buffered file keeps its window logic independent of where the bytes
//! live. A backend only needs positional reads and writes plus length
//! control; `std::fs::File` and [`MemoryStorage`] are provided.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Positional byte storage.
///
/// Implementations are used by exactly one handle at a time and need no
/// internal synchronization.
pub trait Storage: Send + std::fmt::Debug {
    /// Read up to `buf.len()` bytes starting at `pos`.
    ///
    /// Returns the number of bytes read. Fewer bytes than requested means the
    /// end of storage was reached.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `buf` starting at `pos`, growing the storage if needed.
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> io::Result<()>;

    /// Current length in bytes.
    fn len(&mut self) -> io::Result<u64>;

    /// Grow (zero filled) or truncate to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Push written data down to durable storage.
    fn sync(&mut self) -> io::Result<()>;

    /// True when the storage holds no bytes.
    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Storage for File {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(pos))?;
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        self.write_all(buf)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// In-memory storage backed by a byte vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    data: Vec<u8>,
}

impl MemoryStorage {
    /// Wrap an existing byte vector.
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Borrow the stored bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the stored bytes back.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for MemoryStorage {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

fn memory_offset(pos: u64) -> io::Result<usize> {
    usize::try_from(pos).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("offset {pos} exceeds addressable memory"),
        )
    })
}

impl Storage for MemoryStorage {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = memory_offset(pos)?;
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> io::Result<()> {
        let start = memory_offset(pos)?;
        let end = start + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = memory_offset(len)?;
        self.data.resize(len, 0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}
