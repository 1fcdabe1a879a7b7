//! Integration tests for LZW decoding using streams produced by a
//! `compress`-compatible encoder.
//!
//! Every fixture decodes with `gzip -dc` to the matching plain file.
//!
//! - `text.txt.Z`: 16-bit block mode, table fills up without clearing
//! - `text_nb.txt.Z`: 12-bit, no block mode
//! - `small_alpha.bin.Z`: 10-bit block mode with several table clears

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use nimbus_formats::lzw::{self, LzwDecoder, LzwError};
use nimbus_formats::uncompress_file;
use nimbus_io::ErrorKind;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::{self, Read};
use std::path::Path;

fn fixtures_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures/lzw")
        .leak()
}

fn read_fixture(name: &str) -> Vec<u8> {
    let path = fixtures_dir().join(name);
    std::fs::read(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

/// Reader that hands out at most `step` bytes per call.
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.step).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn decode_chunked(compressed: &[u8], in_step: usize, out_step: usize) -> Result<Vec<u8>, LzwError> {
    let mut decoder = LzwDecoder::new(Trickle {
        data: compressed,
        step: in_step,
    })?;
    let mut out = Vec::new();
    let mut buf = vec![0u8; out_step];
    loop {
        let n = decoder.decode_chunk(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

const FIXTURES: [(&str, &str); 3] = [
    ("text.txt.Z", "text.txt"),
    ("text_nb.txt.Z", "text.txt"),
    ("small_alpha.bin.Z", "small_alpha.bin"),
];

#[test]
fn lzw_fixtures_decode_exactly() {
    for (compressed, plain) in FIXTURES {
        let data = read_fixture(compressed);
        let expected = read_fixture(plain);
        let decoded = lzw::decompress(&data)
            .unwrap_or_else(|e| panic!("{compressed} should decode: {e}"));
        assert_eq!(decoded.len(), expected.len(), "{compressed}");
        assert!(decoded == expected, "{compressed} output differs");
    }
}

#[test]
fn lzw_fixture_headers() {
    let text_data = read_fixture("text.txt.Z");
    let text = LzwDecoder::new(&text_data[..]).unwrap();
    assert_eq!(text.header().max_bits, 16);
    assert!(text.header().block_mode);

    let nb_data = read_fixture("text_nb.txt.Z");
    let nb = LzwDecoder::new(&nb_data[..]).unwrap();
    assert_eq!(nb.header().max_bits, 12);
    assert!(!nb.header().block_mode);

    let alpha_data = read_fixture("small_alpha.bin.Z");
    let alpha = LzwDecoder::new(&alpha_data[..]).unwrap();
    assert_eq!(alpha.header().max_bits, 10);
    assert!(alpha.header().block_mode);
}

#[test]
fn lzw_chunked_input_and_output() {
    for (compressed, plain) in FIXTURES {
        let data = read_fixture(compressed);
        let expected = read_fixture(plain);
        for (in_step, out_step) in [(1, 7), (5, 1), (13, 4096), (usize::MAX, 3)] {
            let decoded = decode_chunked(&data, in_step, out_step).unwrap_or_else(|e| {
                panic!("{compressed} in={in_step} out={out_step} failed: {e}")
            });
            assert!(
                decoded == expected,
                "{compressed} in={in_step} out={out_step} output differs"
            );
        }
    }
}

#[test]
fn lzw_read_trait_matches_decompress() {
    let data = read_fixture("small_alpha.bin.Z");
    let mut decoder = LzwDecoder::new(&data[..]).unwrap();
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    assert_eq!(out, read_fixture("small_alpha.bin"));
}

#[test]
fn lzw_truncated_stream_is_detected() {
    for (compressed, _) in FIXTURES {
        let data = read_fixture(compressed);
        let err = lzw::decompress(&data[..data.len() - 1])
            .expect_err("dropping the last byte must fail");
        assert!(
            matches!(err, LzwError::Truncated { .. }),
            "{compressed}: unexpected error {err}"
        );
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}

#[test]
fn lzw_truncated_stream_through_read_is_unexpected_eof() {
    let data = read_fixture("text.txt.Z");
    let mut decoder = LzwDecoder::new(&data[..data.len() - 1]).unwrap();
    let err = decoder.read_to_end(&mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn lzw_corrupt_code_in_fixture() {
    // Setting the high bit of the first code makes it a non-literal
    let mut data = read_fixture("text.txt.Z");
    data[4] = 0xFF;
    data[5] = 0xFF;
    let err = lzw::decompress(&data).expect_err("corrupted stream must fail");
    assert_eq!(err.kind(), ErrorKind::Corrupt);
}

#[test]
fn lzw_uncompress_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let compressed = dir.path().join("text.txt.Z");
    std::fs::copy(fixtures_dir().join("text.txt.Z"), &compressed).unwrap();

    let out = uncompress_file(&compressed).unwrap();
    assert_eq!(out, dir.path().join("text.txt"));
    assert!(std::fs::read(&out).unwrap() == read_fixture("text.txt"));
}

proptest! {
    /// Garbage after a valid header never panics
    #[test]
    fn lzw_random_body_never_panics(body in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut data = vec![0x1f, 0x9d, 0x90];
        data.extend_from_slice(&body);
        let _ = lzw::decompress(&data);
    }

    /// Headers with a foreign magic are always rejected
    #[test]
    fn lzw_foreign_magic_rejected(
        magic in any::<u16>().prop_filter("not compress magic", |m| *m != lzw::LZW_MAGIC),
        flags in any::<u8>(),
    ) {
        let [hi, lo] = magic.to_be_bytes();
        prop_assert!(matches!(
            lzw::decompress(&[hi, lo, flags, 0, 0]),
            Err(LzwError::InvalidMagic(m)) if m == magic
        ));
    }
}
