//! batchguard - bounded batch task runner
//!
//! Runs an ordered batch of tasks on a background thread and reports the
//! first of three outcomes:
//! - **Completion** - every task ran
//! - **Timeout** - the deadline armed at construction elapsed first
//! - **Interrupted** - a shutdown signal arrived and was honored between tasks
//!
//! ```no_run
//! use std::time::Duration;
//! use batchguard::{Runner, RunnerError};
//!
//! # async fn example() {
//! let runner = Runner::new(Duration::from_secs(3))
//!     .with_task(|i| println!("task #{}", i))
//!     .with_task(|i| println!("task #{}", i));
//!
//! match runner.start().await {
//!     Ok(()) => println!("done"),
//!     Err(RunnerError::Timeout) => std::process::exit(1),
//!     Err(RunnerError::Interrupted) => std::process::exit(2),
//! }
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod runner;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ErrorInfo, ExecError, RunnerError};
pub use executor::{
    exec_command, exec_command_sync, ChildGroups, CommandTask, ExecOptions, ExecResult,
};
pub use runner::{
    CancelHandle, Interrupt, InterruptSource, OsSignals, Runner, SignalName, Subscription, Task,
};
