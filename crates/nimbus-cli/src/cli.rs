//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use nimbus_io::{ByteOrder, DEFAULT_BUFFER_SIZE};
use std::path::PathBuf;

/// Inspect and uncompress scientific data files.
#[derive(Debug, Clone, Parser)]
#[command(name = "nimbus", version)]
pub struct Cli {
    /// Log filter (for example `info` or `nimbus_io=trace`)
    #[arg(long, global = true, env = "NIMBUS_LOG", default_value = "info")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Decompress a `.Z` file
    Uncompress(UncompressArgs),
    /// Decode typed values at an offset
    Dump(DumpArgs),
    /// Show file length and buffer state
    Stat(StatArgs),
}

/// Arguments of `nimbus uncompress`
#[derive(Debug, Clone, Args)]
pub struct UncompressArgs {
    /// Compressed input file
    pub file: PathBuf,

    /// Output file (defaults to the input without its `.Z` suffix)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `nimbus dump`
#[derive(Debug, Clone, Args)]
pub struct DumpArgs {
    /// File to read; `.Z` files are uncompressed first
    pub file: String,

    /// Byte offset of the first value
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Number of values to decode
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Value type
    #[arg(long = "type", value_enum, default_value_t = ValueType::I32)]
    pub value_type: ValueType,

    /// Decode multi-byte values as little-endian
    #[arg(long)]
    pub little_endian: bool,

    /// Read buffer size in bytes
    #[arg(long, env = "NIMBUS_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl DumpArgs {
    /// Byte order selected by the flags
    pub const fn order(&self) -> ByteOrder {
        if self.little_endian {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }
}

/// Arguments of `nimbus stat`
#[derive(Debug, Clone, Args)]
pub struct StatArgs {
    /// File to inspect; `.Z` files are uncompressed first
    pub file: String,

    /// Read buffer size in bytes
    #[arg(long, env = "NIMBUS_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

/// Scalar types understood by `nimbus dump`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    /// Unsigned byte
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}
