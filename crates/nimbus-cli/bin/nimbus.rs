//! `nimbus` binary entry point.
//!
//! Parses arguments, initializes logging and runs the selected subcommand.

use anyhow::Result;
use clap::Parser;
use nimbus_cli::{Cli, run};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log-level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli.command, &mut out)
}
