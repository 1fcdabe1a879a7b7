//! Buffered reads and writes must agree with direct storage access.
//!
//! A random mix of seeks, reads and writes runs against a real file through
//! `RandomAccessFile` and against a plain byte vector. Every read must see
//! what the vector holds, and the file must equal the vector after close.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use nimbus_io::{ByteOrder, OpenMode, RandomAccessFile};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
enum Op {
    Seek(u64),
    Read(usize),
    ReadByte,
    Write(Vec<u8>),
    WriteByte(u8),
    Flush,
    Sync,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..300).prop_map(Op::Seek),
        3 => (0usize..64).prop_map(Op::Read),
        2 => Just(Op::ReadByte),
        3 => prop::collection::vec(any::<u8>(), 0..48).prop_map(Op::Write),
        2 => any::<u8>().prop_map(Op::WriteByte),
        1 => Just(Op::Flush),
        1 => Just(Op::Sync),
    ]
}

/// Reference semantics: a growable byte vector plus a position.
struct Model {
    data: Vec<u8>,
    pos: usize,
}

impl Model {
    fn read(&mut self, len: usize) -> Vec<u8> {
        let start = self.pos.min(self.data.len());
        let end = (self.pos + len).min(self.data.len());
        let out = self.data[start..end].to_vec();
        self.pos += out.len();
        out
    }

    fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }
}

fn location(file: &NamedTempFile) -> String {
    file.path().to_str().expect("utf-8 temp path").to_string()
}

fn run_ops(initial: &[u8], buffer_size: usize, ops: &[Op]) -> Result<(), TestCaseError> {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), initial).unwrap();
    let location = location(&file);

    let fail = |e: nimbus_io::IoError| TestCaseError::fail(e.to_string());
    let mut raf = RandomAccessFile::open_with_buffer(&location, OpenMode::ReadWrite, buffer_size)
        .map_err(fail)?;
    let mut model = Model {
        data: initial.to_vec(),
        pos: 0,
    };

    for op in ops {
        match op {
            Op::Seek(pos) => {
                raf.seek(*pos).map_err(fail)?;
                model.pos = *pos as usize;
            }
            Op::Read(len) => {
                let mut buf = vec![0u8; *len];
                let n = raf.read(&mut buf).map_err(fail)?;
                prop_assert_eq!(&buf[..n], &model.read(*len)[..]);
            }
            Op::ReadByte => {
                let expected = model.read(1).first().copied();
                prop_assert_eq!(raf.read_byte().map_err(fail)?, expected);
            }
            Op::Write(bytes) => {
                raf.write_bytes(bytes).map_err(fail)?;
                model.write(bytes);
            }
            Op::WriteByte(b) => {
                raf.write_u8(*b).map_err(fail)?;
                model.write(&[*b]);
            }
            Op::Flush => raf.flush().map_err(fail)?,
            Op::Sync => raf.sync().map_err(fail)?,
        }
        prop_assert_eq!(raf.file_pointer(), model.pos as u64);
        prop_assert_eq!(raf.length().map_err(fail)?, model.data.len() as u64);
    }

    raf.close().map_err(fail)?;
    prop_assert_eq!(std::fs::read(file.path()).unwrap(), model.data);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Random interleavings of buffered operations match the byte model
    #[test]
    fn buffered_operations_match_model(
        initial in prop::collection::vec(any::<u8>(), 0..200),
        buffer_size in 1usize..40,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        run_ops(&initial, buffer_size, &ops)?;
    }
}

#[test]
fn test_buffered_read_matches_unbuffered_read() {
    let file = NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..100_000u32).map(|i| (i.wrapping_mul(31) >> 3) as u8).collect();
    std::fs::write(file.path(), &data).unwrap();

    let mut raf = RandomAccessFile::open_with_buffer(&location(&file), OpenMode::ReadOnly, 8192).unwrap();
    raf.seek(50_000).unwrap();
    let buffered = raf.read_i32().unwrap();
    assert_eq!(buffered, raf.read_i32_unbuffered(50_000).unwrap());
    assert_eq!(raf.file_pointer(), 50_004);

    raf.set_order(ByteOrder::LittleEndian);
    raf.seek(50_000).unwrap();
    assert_eq!(raf.read_i32().unwrap(), raf.read_i32_unbuffered(50_000).unwrap());
    assert_eq!(buffered.swap_bytes(), raf.read_i32_unbuffered(50_000).unwrap());
}

#[test]
fn test_values_survive_close_and_reopen() {
    let file = NamedTempFile::new().unwrap();
    let location = location(&file);

    let mut raf = RandomAccessFile::open_with_buffer(&location, OpenMode::ReadWrite, 16).unwrap();
    raf.write_i32_slice(&[1, -1, i32::MAX, i32::MIN]).unwrap();
    raf.write_f64(std::f64::consts::PI).unwrap();
    raf.write_utf("temperature").unwrap();
    raf.close().unwrap();

    let mut raf = RandomAccessFile::open(&location, OpenMode::ReadOnly).unwrap();
    let mut ints = [0i32; 4];
    raf.read_i32_into(&mut ints).unwrap();
    assert_eq!(ints, [1, -1, i32::MAX, i32::MIN]);
    assert_eq!(raf.read_f64().unwrap().to_bits(), std::f64::consts::PI.to_bits());
    assert_eq!(raf.read_utf().unwrap(), "temperature");
    assert_eq!(raf.read_byte().unwrap(), None);
}

#[test]
fn test_min_length_truncates_on_close() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![7u8; 64]).unwrap();

    let mut raf = RandomAccessFile::open(&location(&file), OpenMode::ReadWrite).unwrap();
    raf.set_min_length(10);
    raf.seek(60).unwrap();
    raf.write_u8(1).unwrap();
    raf.close().unwrap();

    assert_eq!(std::fs::read(file.path()).unwrap(), vec![7u8; 10]);
}
