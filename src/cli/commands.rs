//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::runner::SignalName;

/// Bounded batch runner for cron-style jobs.
///
/// Runs a list of commands in order under a deadline and stops between
/// commands when a shutdown signal arrives.
#[derive(Parser, Debug)]
#[command(name = "batchguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured batch plus any --task commands
    Run(RunArgs),

    /// Run sample tasks where task N sleeps N units
    Demo(DemoArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Options shared by every subcommand that runs a batch
#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Batch deadline in seconds (overrides [runner].timeout_secs)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Signals that interrupt the batch (overrides [runner].signals)
    #[arg(short, long = "signal", value_parser = parse_signal)]
    pub signals: Vec<SignalName>,

    /// Ignore OS signals entirely
    #[arg(long, conflicts_with = "signals")]
    pub no_signals: bool,

    /// Output format for the final result
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Shell command to append to the batch (repeatable)
    #[arg(long = "task", value_name = "COMMAND")]
    pub tasks: Vec<String>,

    /// Don't echo command output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `demo` subcommand
#[derive(Parser, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Number of tasks
    #[arg(short = 'n', long, default_value = "3")]
    pub count: usize,

    /// Sleep unit in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub unit_ms: u64,
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

/// Output format for batch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable status line
    Table,
    /// JSON object
    Json,
}

/// Output format for the `config` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

fn parse_signal(s: &str) -> Result<SignalName, String> {
    s.parse()
}
