//! CLI module for batchguard
//!
//! Provides command-line interface with the following subcommands:
//! - `run` - Run the configured batch of commands
//! - `demo` - Run sample sleeping tasks
//! - `config` - Show configuration

pub mod commands;

pub use commands::{Cli, Commands};
