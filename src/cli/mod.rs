//! Command-line interface for lexforge.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
