//! Library side of the `nimbus` command-line tool.
//!
//! The binary in `bin/nimbus.rs` only parses arguments, installs logging and
//! calls [`run`].

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command};
pub use commands::run;
