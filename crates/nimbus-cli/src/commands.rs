//! Subcommand implementations.
//!
//! Each command writes its report to the given writer so it can be checked
//! without a terminal.

use std::io::Write;

use anyhow::{Context, Result};
use nimbus_formats::{decompress_to_file, open_decompressed, uncompress_file};
use nimbus_io::RandomAccessFile;
use tracing::debug;

use crate::cli::{Command, DumpArgs, StatArgs, UncompressArgs, ValueType};

const MAGIC_PREVIEW: usize = 4;

/// Run `command`, writing its output to `out`.
pub fn run(command: &Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Uncompress(args) => uncompress(args, out),
        Command::Dump(args) => dump(args, out),
        Command::Stat(args) => stat(args, out),
    }
}

fn uncompress(args: &UncompressArgs, out: &mut dyn Write) -> Result<()> {
    let target = match &args.output {
        Some(output) => {
            let bytes = decompress_to_file(&args.file, output)
                .with_context(|| format!("Failed to uncompress {}", args.file.display()))?;
            debug!("Wrote {} bytes to {}", bytes, output.display());
            output.clone()
        }
        None => uncompress_file(&args.file)
            .with_context(|| format!("Failed to uncompress {}", args.file.display()))?,
    };
    writeln!(out, "{}", target.display())?;
    Ok(())
}

fn open(location: &str, buffer_size: usize) -> Result<RandomAccessFile> {
    open_decompressed(location, buffer_size).with_context(|| format!("Failed to open {location}"))
}

fn dump(args: &DumpArgs, out: &mut dyn Write) -> Result<()> {
    let mut raf = open(&args.file, args.buffer_size)?;
    raf.set_order(args.order());
    raf.seek(args.offset)?;

    for index in 0..args.count {
        let position = raf.file_pointer();
        let value = read_value(&mut raf, args.value_type)
            .with_context(|| format!("Failed to read value {index} at offset {position}"))?;
        writeln!(out, "{value}")?;
    }
    raf.close()?;
    Ok(())
}

fn read_value(raf: &mut RandomAccessFile, value_type: ValueType) -> nimbus_io::IoResult<String> {
    Ok(match value_type {
        ValueType::U8 => raf.read_u8()?.to_string(),
        ValueType::I16 => raf.read_i16()?.to_string(),
        ValueType::U16 => raf.read_u16()?.to_string(),
        ValueType::I32 => raf.read_i32()?.to_string(),
        ValueType::U32 => raf.read_u32()?.to_string(),
        ValueType::I64 => raf.read_i64()?.to_string(),
        ValueType::F32 => raf.read_f32()?.to_string(),
        ValueType::F64 => raf.read_f64()?.to_string(),
    })
}

fn stat(args: &StatArgs, out: &mut dyn Write) -> Result<()> {
    let mut raf = open(&args.file, args.buffer_size)?;
    let length = raf.length()?;

    // The first read fills the window
    let mut magic = [0u8; MAGIC_PREVIEW];
    let n = raf.read(&mut magic)?;

    writeln!(out, "location: {}", raf.location())?;
    writeln!(out, "length: {length}")?;
    writeln!(out, "magic: {}", hex::encode(&magic[..n]))?;
    writeln!(out, "window: {raf}")?;
    raf.close()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args)?;
        let mut out = Vec::new();
        run(&cli.command, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_dump_big_endian_i32() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = [7i32, -2, 300].iter().flat_map(|v| v.to_be_bytes()).collect();
        let file = write_file(&dir, "values.bin", &data);

        let output = run_args(&["nimbus", "dump", &file, "--offset", "4", "--count", "2"]).unwrap();
        assert_eq!(output, "-2\n300\n");
    }

    #[test]
    fn test_dump_little_endian_u16() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "values.bin", &[0x01, 0x02, 0xFF, 0x00]);

        let output = run_args(&[
            "nimbus",
            "dump",
            &file,
            "--count",
            "2",
            "--type",
            "u16",
            "--little-endian",
            "--buffer-size",
            "3",
        ])
        .unwrap();
        assert_eq!(output, "513\n255\n");
    }

    #[test]
    fn test_dump_past_end_fails() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "short.bin", &[0, 0, 0, 1, 0, 0]);

        let err = run_args(&["nimbus", "dump", &file, "--count", "2"]).unwrap_err();
        assert!(err.to_string().contains("value 1 at offset 4"));
    }

    #[test]
    fn test_stat_reports_length_and_window() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "obs.nc", b"CDF\x01payload");

        let output = run_args(&["nimbus", "stat", &file, "--buffer-size", "8"]).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], format!("location: {file}"));
        assert_eq!(lines[1], "length: 11");
        assert_eq!(lines[2], "magic: 43444601");
        assert_eq!(
            lines[3],
            "window: fp=4, bs=0, de=8, ds=8, bl=8, readonly=true, bm=true"
        );
    }

    #[test]
    fn test_uncompress_to_explicit_output() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "ab.Z", &[0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00]);
        let target = dir.path().join("restored.txt");

        let output = run_args(&[
            "nimbus",
            "uncompress",
            &input,
            "-o",
            target.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(output.trim_end(), target.to_str().unwrap());
        assert_eq!(std::fs::read(&target).unwrap(), b"ab");
    }

    #[test]
    fn test_uncompress_next_to_input_then_dump() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "ab.txt.Z", &[0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00]);

        let output = run_args(&["nimbus", "uncompress", &input]).unwrap();
        assert_eq!(
            output.trim_end(),
            dir.path().join("ab.txt").to_str().unwrap()
        );

        let dumped = run_args(&["nimbus", "dump", &input, "--count", "2", "--type", "u8"]).unwrap();
        assert_eq!(dumped, "97\n98\n");
    }

    #[test]
    fn test_uncompress_rejects_foreign_data() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "plain.Z", b"plain text");
        let target = dir.path().join("out");

        let result = run_args(&["nimbus", "uncompress", &input, "-o", target.to_str().unwrap()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_uncompress_corrupt_body_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        // valid header, then a code past the table
        let input = write_file(&dir, "bad.Z", &[0x1f, 0x9d, 0x90, 0x61, 0x58, 0x02]);
        let target = dir.path().join("restored.bin");

        let err = run_args(&["nimbus", "uncompress", &input, "-o", target.to_str().unwrap()])
            .unwrap_err();
        assert!(err.to_string().contains("Failed to uncompress"));
        assert!(!target.exists());
    }
}
