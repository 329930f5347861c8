//! Command-line interface for vimgolf-bench.
//!
//! Provides commands for solving the challenge set with a model and for
//! scoring, extracting, and counting keystroke sequences by hand.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
