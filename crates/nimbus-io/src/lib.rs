//! Buffered random-access file I/O for binary scientific data formats.
//!
//! The central type is [`RandomAccessFile`], a seekable handle that keeps one
//! in-memory window over the file and decodes multi-byte values in a chosen
//! [`ByteOrder`]. Storage is pluggable through the [`Storage`] trait, so the
//! same code reads local files and in-memory buffers.
//!
//! # Example
//!
//! ```
//! use nimbus_io::{ByteOrder, RandomAccessFile};
//!
//! let mut raf = RandomAccessFile::from_bytes("header", vec![0x43, 0x44, 0x46, 0x01, 0x10, 0x00]);
//! assert_eq!(raf.read_string(3)?, "CDF");
//! assert_eq!(raf.read_u8()?, 1);
//!
//! raf.set_order(ByteOrder::LittleEndian);
//! assert_eq!(raf.read_u16()?, 0x0010);
//! # Ok::<(), nimbus_io::IoError>(())
//! ```

#![warn(missing_docs)]

pub mod byte_order;
pub mod error;
pub mod raf;
pub mod storage;

pub use byte_order::ByteOrder;
pub use error::{ErrorKind, IoError, IoResult};
pub use raf::{DEFAULT_BUFFER_SIZE, OpenMode, RandomAccessFile};
pub use storage::{MemoryStorage, Storage};
