//! Configuration model for batchguard
//!
//! Defines the structure for XDG-compliant layered configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::SignalName;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Deadline and signal settings for the batch
    #[serde(default)]
    pub runner: RunnerConfig,

    /// How command tasks are executed
    #[serde(default)]
    pub exec: ExecConfig,

    /// Commands making up the batch, in order
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// Batch-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Deadline for the whole batch in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// OS signals that interrupt the batch
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalName>,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_signals() -> Vec<SignalName> {
    vec![SignalName::Interrupt]
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            signals: default_signals(),
        }
    }
}

impl RunnerConfig {
    /// Batch deadline as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Command execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecConfig {
    /// Shell used to run task commands
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Working directory for commands (defaults to the current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Maximum captured output per stream in bytes
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,

    /// Per-command timeout in seconds (0 = none)
    #[serde(default)]
    pub command_timeout_secs: u64,

    /// Environment variables for every command
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_max_output_size() -> usize {
    100_000
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            working_dir: None,
            max_output_size: default_max_output_size(),
            command_timeout_secs: 0,
            env: HashMap::new(),
        }
    }
}

impl ExecConfig {
    /// Per-command timeout, if any
    pub fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs > 0 {
            Some(Duration::from_secs(self.command_timeout_secs))
        } else {
            None
        }
    }
}

/// One command in the batch
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TaskConfig {
    /// Display name (defaults to the command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Shell command to run
    pub command: String,
}

impl TaskConfig {
    /// Task from a bare command
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            name: None,
            command: command.into(),
        }
    }

    /// Name used in logs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }
}
