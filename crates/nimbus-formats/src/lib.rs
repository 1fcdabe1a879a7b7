//! Decoders for compressed scientific data files.
//!
//! Archives of gridded observations are often stored with Unix `compress`
//! (`.Z`). This crate decodes that format as a stream ([`lzw::LzwDecoder`]),
//! in memory ([`lzw::decompress`]) or file to file ([`uncompress_file`]),
//! and hands the result to [`nimbus_io::RandomAccessFile`].
//!
//! # Example
//!
//! ```no_run
//! use nimbus_formats::open_decompressed;
//!
//! let mut raf = open_decompressed("archive/radar_0600.nc.Z", 8092)?;
//! let magic = raf.read_string(3)?;
//! # let _ = magic;
//! # Ok::<(), nimbus_io::IoError>(())
//! ```

#![warn(missing_docs)]

pub mod lzw;
pub mod uncompress;

pub use lzw::{LzwDecoder, LzwError, LzwHeader, LzwResult, decompress};
pub use uncompress::{decompress_to_file, open_decompressed, uncompress_file};
