//! Buffered random-access file.
//!
//! A [`RandomAccessFile`] keeps one in-memory window over the file. Reads and
//! writes inside the window never touch storage; leaving it writes back any
//! dirty bytes and reloads the window at the new position. Multi-byte reads
//! honor the handle's [`ByteOrder`]; multi-byte writes are always big-endian.
//!
//! ```no_run
//! use nimbus_io::{ByteOrder, OpenMode, RandomAccessFile};
//!
//! let mut raf = RandomAccessFile::open("data/obs.nc", OpenMode::ReadOnly)?;
//! raf.set_order(ByteOrder::LittleEndian);
//! raf.seek(128)?;
//! let count = raf.read_i32()?;
//! raf.close()?;
//! # let _ = count;
//! # Ok::<(), nimbus_io::IoError>(())
//! ```

mod scalar;
mod window;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;

use tracing::{debug, trace, warn};

use crate::byte_order::ByteOrder;
use crate::error::{IoError, IoResult};
use crate::storage::{MemoryStorage, Storage};

use window::Window;

/// Default window size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8092;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OpenMode {
    /// Reads only, writes fail with [`IoError::ReadOnly`]
    #[default]
    ReadOnly,
    /// Reads and writes; the file is created if missing
    ReadWrite,
}

impl OpenMode {
    /// True for [`OpenMode::ReadOnly`].
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

/// The storage side of a handle: the backend plus the settings that shape
/// physical reads.
struct Backing {
    location: String,
    storage: Option<Box<dyn Storage>>,
    extend_mode: bool,
}

impl Backing {
    fn live(&mut self) -> IoResult<&mut (dyn Storage + 'static)> {
        match self.storage.as_deref_mut() {
            Some(storage) => Ok(storage),
            None => Err(IoError::Closed {
                location: self.location.clone(),
            }),
        }
    }

    fn check_open(&self) -> IoResult<()> {
        if self.storage.is_some() {
            Ok(())
        } else {
            Err(IoError::Closed {
                location: self.location.clone(),
            })
        }
    }

    /// Physical read. In extend mode a short read counts as full and the
    /// tail is zeroed.
    fn read(&mut self, pos: u64, buf: &mut [u8]) -> IoResult<usize> {
        let extend = self.extend_mode;
        let n = self.live()?.read_at(pos, buf)?;
        trace!("{}: read {} of {} bytes at {}", self.location, n, buf.len(), pos);
        if extend && n < buf.len() {
            buf[n..].fill(0);
            return Ok(buf.len());
        }
        Ok(n)
    }

    fn write(&mut self, pos: u64, buf: &[u8]) -> IoResult<()> {
        self.live()?.write_at(pos, buf)?;
        trace!("{}: wrote {} bytes at {}", self.location, buf.len(), pos);
        Ok(())
    }
}

/// Buffered random-access file with selectable read byte order.
pub struct RandomAccessFile {
    backing: Backing,
    window: Window,
    mode: OpenMode,
    file_position: u64,
    order: ByteOrder,
    min_length: u64,
}

impl RandomAccessFile {
    /// Open `location` with the default buffer size.
    pub fn open(location: &str, mode: OpenMode) -> IoResult<Self> {
        Self::open_with_buffer(location, mode, DEFAULT_BUFFER_SIZE)
    }

    /// Open `location` with a window of `buffer_size` bytes.
    ///
    /// A read-write open creates the file if it does not exist.
    pub fn open_with_buffer(location: &str, mode: OpenMode, buffer_size: usize) -> IoResult<Self> {
        let file = match mode {
            OpenMode::ReadOnly => File::open(location)?,
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(location)?,
        };
        let raf = Self::with_storage(location, file, mode, buffer_size)?;
        debug!("Opened {} ({:?}, buffer {})", location, mode, buffer_size);
        Ok(raf)
    }

    /// Read-only handle over an in-memory byte vector.
    pub fn from_bytes(location: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new_unchecked(
            location.into(),
            Box::new(MemoryStorage::new(data)),
            OpenMode::ReadOnly,
            DEFAULT_BUFFER_SIZE,
        )
    }

    /// Handle over any [`Storage`] backend.
    pub fn with_storage<S: Storage + 'static>(
        location: impl Into<String>,
        storage: S,
        mode: OpenMode,
        buffer_size: usize,
    ) -> IoResult<Self> {
        if buffer_size == 0 {
            return Err(IoError::InvalidArgument(
                "buffer size must be greater than zero".to_string(),
            ));
        }
        Ok(Self::new_unchecked(
            location.into(),
            Box::new(storage),
            mode,
            buffer_size,
        ))
    }

    fn new_unchecked(
        location: String,
        storage: Box<dyn Storage>,
        mode: OpenMode,
        buffer_size: usize,
    ) -> Self {
        Self {
            backing: Backing {
                location,
                storage: Some(storage),
                extend_mode: false,
            },
            window: Window::new(buffer_size),
            mode,
            file_position: 0,
            order: ByteOrder::BigEndian,
            min_length: 0,
        }
    }

    /// Location this handle was opened from.
    pub fn location(&self) -> &str {
        &self.backing.location
    }

    /// Current file position.
    pub const fn file_pointer(&self) -> u64 {
        self.file_position
    }

    /// Byte order used by multi-byte reads.
    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    /// Change the byte order of subsequent multi-byte reads.
    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Open mode of this handle.
    pub const fn mode(&self) -> OpenMode {
        self.mode
    }

    /// True when writes are rejected.
    pub const fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }

    /// Window capacity in bytes.
    pub fn buffer_size(&self) -> usize {
        self.window.capacity()
    }

    /// True when the last window refill found no bytes.
    pub const fn is_at_end_of_file(&self) -> bool {
        self.window.end_of_file
    }

    /// True once [`close`](Self::close) has run.
    pub const fn is_closed(&self) -> bool {
        self.backing.storage.is_none()
    }

    /// Length the file must have when flushed or closed. Zero disables the
    /// policy.
    pub fn set_min_length(&mut self, min_length: u64) {
        self.min_length = min_length;
    }

    /// Treat reads past the physical end of storage as zero-filled.
    pub fn set_extend_mode(&mut self) {
        self.backing.extend_mode = true;
    }

    /// Logical length: the storage length, extended by unflushed writes in
    /// the window.
    pub fn length(&mut self) -> IoResult<u64> {
        let stored = self.backing.live()?.len()?;
        if self.window.dirty {
            Ok(stored.max(self.window.data_end()))
        } else {
            Ok(stored)
        }
    }

    /// Move the file position to `pos`.
    ///
    /// Inside the window only the position moves. Otherwise the window is
    /// written back if dirty and reloaded starting at `pos`.
    pub fn seek(&mut self, pos: u64) -> IoResult<()> {
        self.backing.check_open()?;
        if self.window.contains(pos) {
            self.file_position = pos;
            return Ok(());
        }
        self.refill(pos)
    }

    fn refill(&mut self, pos: u64) -> IoResult<()> {
        self.flush_window()?;
        self.window.buffer_start = pos;
        self.file_position = pos;
        let n = self.backing.read(pos, &mut self.window.buffer)?;
        self.window.data_size = n;
        self.window.end_of_file = n == 0;
        Ok(())
    }

    fn flush_window(&mut self) -> IoResult<()> {
        if self.window.dirty {
            self.backing
                .write(self.window.buffer_start, self.window.valid())?;
            self.window.dirty = false;
        }
        Ok(())
    }

    /// True when the window has nothing more to give at the current position.
    fn exhausted_at_eof(&self) -> bool {
        self.window.end_of_file && self.file_position == self.window.data_end()
    }

    /// Read one byte, or `None` at end of file.
    pub fn read_byte(&mut self) -> IoResult<Option<u8>> {
        self.backing.check_open()?;
        if let Some(b) = self.window.byte_at(self.file_position) {
            self.file_position += 1;
            return Ok(Some(b));
        }
        if self.exhausted_at_eof() {
            return Ok(None);
        }
        self.refill(self.file_position)?;
        match self.window.byte_at(self.file_position) {
            Some(b) => {
                self.file_position += 1;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    /// Read up to `buf.len()` bytes. Returns 0 only at end of file.
    ///
    /// The window is drained first. A remainder larger than the window goes
    /// straight to storage; a smaller one reloads the window.
    pub fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.backing.check_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.window.contains(self.file_position) {
            if self.exhausted_at_eof() {
                return Ok(0);
            }
            self.refill(self.file_position)?;
            if self.window.data_size == 0 {
                return Ok(0);
            }
        }

        let available = (self.window.data_end() - self.file_position) as usize;
        let copied = available.min(buf.len());
        let offset = self.window.offset(self.file_position);
        buf[..copied].copy_from_slice(&self.window.buffer[offset..offset + copied]);
        self.file_position += copied as u64;
        if copied == buf.len() {
            return Ok(copied);
        }

        let rest = &mut buf[copied..];
        let extra = if rest.len() > self.window.capacity() {
            self.backing.read(self.file_position, rest)?
        } else {
            self.refill(self.file_position)?;
            let n = rest.len().min(self.window.data_size);
            rest[..n].copy_from_slice(&self.window.buffer[..n]);
            n
        };
        self.file_position += extra as u64;
        Ok(copied + extra)
    }

    /// Fill `buf` completely or fail with [`IoError::UnexpectedEof`].
    pub fn read_fully(&mut self, buf: &mut [u8]) -> IoResult<()> {
        let offset = self.file_position;
        let mut done = 0;
        while done < buf.len() {
            let n = self.read(&mut buf[done..])?;
            if n == 0 {
                return Err(IoError::UnexpectedEof {
                    offset,
                    needed: buf.len(),
                });
            }
            done += n;
        }
        Ok(())
    }

    /// Read exactly `n` bytes into a new vector.
    pub fn read_bytes(&mut self, n: usize) -> IoResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_fully(&mut buf)?;
        Ok(buf)
    }

    /// Read at `pos` directly from storage, leaving the window and file
    /// position untouched. A dirty window is written back first.
    pub fn read_unbuffered(&mut self, pos: u64, buf: &mut [u8]) -> IoResult<usize> {
        self.flush_window()?;
        self.backing.read(pos, buf)
    }

    /// Read a 4-byte integer at `pos` directly from storage, honoring the
    /// byte order.
    pub fn read_i32_unbuffered(&mut self, pos: u64) -> IoResult<i32> {
        let mut bytes = [0u8; 4];
        let n = self.read_unbuffered(pos, &mut bytes)?;
        if n < bytes.len() {
            return Err(IoError::UnexpectedEof {
                offset: pos,
                needed: bytes.len(),
            });
        }
        Ok(crate::byte_order::decode_i32(bytes, self.order))
    }

    /// Copy `nbytes` starting at `offset` from storage to `writer`.
    ///
    /// Stops early at end of storage and returns the number of bytes copied.
    pub fn read_to_writer<W: Write + ?Sized>(
        &mut self,
        offset: u64,
        nbytes: u64,
        writer: &mut W,
    ) -> IoResult<u64> {
        self.flush_window()?;
        let mut chunk = vec![0u8; self.window.capacity()];
        let mut copied = 0u64;
        while copied < nbytes {
            let want = chunk.len().min((nbytes - copied) as usize);
            let n = self.backing.read(offset + copied, &mut chunk[..want])?;
            if n == 0 {
                break;
            }
            writer.write_all(&chunk[..n])?;
            copied += n as u64;
        }
        Ok(copied)
    }

    /// Advance the position by `n` bytes.
    pub fn skip_bytes(&mut self, n: u64) -> IoResult<u64> {
        let target = self.file_position.checked_add(n).ok_or_else(|| {
            IoError::InvalidArgument(format!(
                "skipping {} bytes from {} overflows the file position",
                n, self.file_position
            ))
        })?;
        self.seek(target)?;
        Ok(n)
    }

    /// Step the position back by one byte.
    pub fn unread(&mut self) {
        self.file_position = self.file_position.saturating_sub(1);
    }

    fn check_writable(&self) -> IoResult<()> {
        self.backing.check_open()?;
        if self.mode.is_read_only() {
            return Err(IoError::ReadOnly {
                location: self.backing.location.clone(),
            });
        }
        Ok(())
    }

    /// Write one byte at the current position.
    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.check_writable()?;
        let pos = self.file_position;
        if !self.window.contains(pos)
            && !(pos == self.window.data_end() && self.window.data_size < self.window.capacity())
        {
            self.refill(pos)?;
        }

        let offset = self.window.offset(pos);
        self.window.buffer[offset] = value;
        if offset == self.window.data_size {
            self.window.data_size += 1;
        }
        self.window.dirty = true;
        self.window.end_of_file = false;
        self.file_position += 1;
        Ok(())
    }

    /// Write `buf` at the current position.
    ///
    /// Data that fits in the window is buffered. Anything larger goes straight
    /// to storage and leaves an empty window at the new position.
    pub fn write_bytes(&mut self, buf: &[u8]) -> IoResult<()> {
        self.check_writable()?;
        if buf.is_empty() {
            return Ok(());
        }
        let pos = self.file_position;
        if !self.window.touches(pos) {
            self.refill(pos)?;
        }

        let offset = self.window.offset(pos);
        let end = offset + buf.len();
        if end <= self.window.capacity() {
            self.window.buffer[offset..end].copy_from_slice(buf);
            self.window.data_size = self.window.data_size.max(end);
            self.window.dirty = true;
            self.window.end_of_file = false;
            self.file_position += buf.len() as u64;
        } else {
            self.flush_window()?;
            self.backing.write(pos, buf)?;
            self.file_position = pos + buf.len() as u64;
            self.window.reset(self.file_position);
        }
        Ok(())
    }

    fn apply_min_length(&mut self) -> IoResult<()> {
        if self.mode.is_read_only() || self.min_length == 0 {
            return Ok(());
        }
        let min_length = self.min_length;
        let storage = self.backing.live()?;
        let current = storage.len()?;
        if current != min_length {
            storage.set_len(min_length)?;
            debug!(
                "{}: resized from {} to {} bytes",
                self.backing.location, current, min_length
            );
            self.window.reset(self.file_position);
        }
        Ok(())
    }

    /// Write back the dirty window and apply the min-length policy.
    pub fn flush(&mut self) -> IoResult<()> {
        self.backing.check_open()?;
        self.flush_window()?;
        self.apply_min_length()
    }

    /// Flush, then discard the window so the next read reloads from storage.
    ///
    /// Picks up growth made through other handles since the window was
    /// filled.
    pub fn sync(&mut self) -> IoResult<()> {
        self.flush()?;
        self.window.reset(self.file_position);
        Ok(())
    }

    /// Flush and release the storage.
    ///
    /// The storage is released even when the final flush fails; the flush
    /// error is returned. Closing twice fails with [`IoError::Closed`].
    pub fn close(&mut self) -> IoResult<()> {
        self.backing.check_open()?;
        let result = self
            .flush_window()
            .and_then(|()| self.apply_min_length());
        self.backing.storage = None;
        self.window.dirty = false;
        debug!("Closed {}", self.backing.location);
        result
    }
}

impl Drop for RandomAccessFile {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if self.window.dirty {
            warn!(
                "{} dropped with unflushed data, flushing",
                self.backing.location
            );
        }
        if let Err(e) = self.close() {
            warn!("Failed to flush {} on drop: {}", self.backing.location, e);
        }
    }
}

impl fmt::Display for RandomAccessFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fp={}, bs={}, de={}, ds={}, bl={}, readonly={}, bm={}",
            self.file_position,
            self.window.buffer_start,
            self.window.data_end(),
            self.window.data_size,
            self.window.capacity(),
            self.mode.is_read_only(),
            self.order.is_big_endian(),
        )
    }
}

impl fmt::Debug for RandomAccessFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomAccessFile")
            .field("location", &self.backing.location)
            .field("mode", &self.mode)
            .field("file_position", &self.file_position)
            .field("buffer_start", &self.window.buffer_start)
            .field("data_size", &self.window.data_size)
            .field("dirty", &self.window.dirty)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
