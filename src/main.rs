//! batchguard CLI entry point
//!
//! Usage:
//!   batchguard run [--task CMD]...   Run the configured batch
//!   batchguard demo [-n N]           Run sample sleeping tasks
//!   batchguard config                Show configuration
//!
//! Exit codes: 0 success, 1 timeout, 2 interrupted, 3 any other error.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use batchguard::cli::commands::{
    BatchArgs, ConfigArgs, ConfigFormat, DemoArgs, OutputFormat, RunArgs,
};
use batchguard::cli::{Cli, Commands};
use batchguard::config::{load_config, Config, RunnerConfig, TaskConfig};
use batchguard::runner::sleep_task;
use batchguard::{ChildGroups, CommandTask, ErrorInfo, OsSignals, Runner, RunnerError};

/// Exit code for failures outside the batch itself
const EXIT_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run_batch(args, config).await,
        Commands::Demo(args) => run_demo(args, &config.runner).await,
        Commands::Config(args) => {
            show_config(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run configured commands followed by `--task` commands
async fn run_batch(args: RunArgs, config: Config) -> Result<ExitCode> {
    let mut tasks = config.tasks.clone();
    tasks.extend(args.tasks.iter().map(TaskConfig::command));

    if tasks.is_empty() {
        anyhow::bail!("No tasks to run: add [[tasks]] to the config or pass --task");
    }

    let groups = ChildGroups::new();
    let runner = build_runner(&args.batch, &config.runner).with_tasks(tasks.iter().map(|task| {
        CommandTask::new(task, &config.exec)
            .with_echo(!args.quiet)
            .with_groups(groups.clone())
            .into_task()
    }));

    let result = start(runner, args.batch.format).await;

    // The abandoned batch thread dies with this process, its commands do not.
    if result == Err(RunnerError::Timeout) {
        let killed = groups.kill_all();
        if killed > 0 {
            tracing::warn!("Killed {} command(s) still running at the deadline", killed);
        }
    }

    Ok(exit_code(&result))
}

/// Task `i` sleeps `i * unit`
async fn run_demo(args: DemoArgs, config: &RunnerConfig) -> Result<ExitCode> {
    let unit = Duration::from_millis(args.unit_ms);
    let runner =
        build_runner(&args.batch, config).with_tasks((0..args.count).map(|_| sleep_task(unit)));

    Ok(exit_code(&start(runner, args.batch.format).await))
}

/// Arms the deadline, so call right before starting
fn build_runner(args: &BatchArgs, config: &RunnerConfig) -> Runner {
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.timeout());

    let signals = if args.no_signals {
        Vec::new()
    } else if !args.signals.is_empty() {
        args.signals.clone()
    } else {
        config.signals.clone()
    };

    let runner = Runner::new(timeout);
    if signals.is_empty() {
        runner.without_signals()
    } else {
        runner.with_signals(OsSignals::new(signals))
    }
}

async fn start(runner: Runner, format: OutputFormat) -> Result<(), RunnerError> {
    let tasks = runner.len();
    let started = Instant::now();
    tracing::info!("Starting batch of {} task(s), deadline {:?}", tasks, runner.timeout());

    let result = runner.start().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    report(&result, format, tasks, elapsed_ms);
    result
}

fn exit_code(result: &Result<(), RunnerError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}

fn report(result: &Result<(), RunnerError>, format: OutputFormat, tasks: usize, elapsed_ms: u64) {
    match format {
        OutputFormat::Json => {
            let json = match result {
                Ok(()) => serde_json::json!({
                    "status": "success",
                    "tasks": tasks,
                    "elapsed_ms": elapsed_ms,
                }),
                Err(e) => serde_json::json!({
                    "status": e.error_type(),
                    "tasks": tasks,
                    "elapsed_ms": elapsed_ms,
                    "error": ErrorInfo::from(e),
                }),
            };
            println!("{}", json);
        }
        OutputFormat::Table => match result {
            Ok(()) => eprintln!(
                "{}: {} task(s) completed in {}ms",
                "success".green().bold(),
                tasks,
                elapsed_ms
            ),
            Err(e) => {
                let info = ErrorInfo::from(e);
                eprintln!(
                    "{}: {} after {}ms",
                    e.error_type().red().bold(),
                    info.message,
                    elapsed_ms
                );
                if let Some(suggestion) = info.suggestion {
                    eprintln!("{}: {}", "hint".yellow(), suggestion);
                }
            }
        },
    }
}

fn show_config(args: ConfigArgs, config: &Config) -> Result<()> {
    let rendered = match args.format {
        ConfigFormat::Toml => toml::to_string_pretty(config).context("Failed to render config")?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to render config")?
        }
    };
    println!("{}", rendered);
    Ok(())
}
