//! Decompress-then-open handoff for `.Z` files on disk.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use nimbus_io::{IoResult, OpenMode, RandomAccessFile};
use tracing::{debug, info, warn};

use crate::lzw::{LzwDecoder, LzwResult};

const COPY_BUFFER_SIZE: usize = 100_000;

/// Path of the decompressed sibling of `path`, if `path` ends in `.Z`
/// (any case).
pub fn uncompressed_path(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?;
    if ext.eq_ignore_ascii_case("z") {
        Some(path.with_extension(""))
    } else {
        None
    }
}

/// Decompress a `.Z` file next to itself and return the output path.
///
/// `data/obs.nc.Z` becomes `data/obs.nc`. An existing non-empty output is
/// reused without decoding again. A failed decode removes the partial
/// output. Paths without a `.Z` suffix are returned unchanged.
pub fn uncompress_file(path: impl AsRef<Path>) -> LzwResult<PathBuf> {
    let path = path.as_ref();
    let Some(target) = uncompressed_path(path) else {
        return Ok(path.to_path_buf());
    };

    if let Ok(meta) = fs::metadata(&target)
        && meta.len() > 0
    {
        debug!(
            "Found uncompressed {} for {}",
            target.display(),
            path.display()
        );
        return Ok(target);
    }

    let bytes = decompress_to_file(path, &target)?;
    info!(
        "Uncompressed {} to {} ({} bytes)",
        path.display(),
        target.display(),
        bytes
    );
    Ok(target)
}

/// Decompress `source` into `target` and return the number of bytes written.
///
/// A failed decode removes the partial output.
pub fn decompress_to_file(source: &Path, target: &Path) -> LzwResult<u64> {
    let decoder = LzwDecoder::new(BufReader::new(File::open(source)?))?;
    write_decompressed(decoder, target).inspect_err(|_| remove_partial(target))
}

fn remove_partial(target: &Path) {
    if let Err(e) = fs::remove_file(target)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(
            "Failed to remove partial output {}: {}",
            target.display(),
            e
        );
    }
}

/// Decode everything from `decoder` into a new file at `target`.
fn write_decompressed<R: io::Read>(
    mut decoder: LzwDecoder<R>,
    target: &Path,
) -> LzwResult<u64> {
    let mut out = BufWriter::new(File::create(target)?);
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = decoder.decode_chunk(&mut buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        total += n as u64;
    }
    out.flush()?;
    Ok(total)
}

/// Open `location` read-only, decompressing it first when it ends in `.Z`.
///
/// A file that fails to decompress is opened as-is; the suffix may simply be
/// wrong.
pub fn open_decompressed(location: &str, buffer_size: usize) -> IoResult<RandomAccessFile> {
    let path = match uncompress_file(location) {
        Ok(path) => path,
        Err(e) => {
            warn!(
                "Failed to uncompress {}: {}; opening as a regular file",
                location, e
            );
            PathBuf::from(location)
        }
    };
    RandomAccessFile::open_with_buffer(&path.to_string_lossy(), OpenMode::ReadOnly, buffer_size)
}
