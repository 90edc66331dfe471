//! Shell commands as batch tasks
//!
//! Provides:
//! - Async command execution with an optional per-command timeout
//! - Output capture with truncation for large outputs
//! - Environment variable injection and working directory control
//! - [`CommandTask`], which turns a configured command into a runner task

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use super::group::{ChildGroups, GroupGuard};
use crate::config::{ExecConfig, TaskConfig};
use crate::error::ExecError;
use crate::runner::{task, Task};

/// Maximum output size before truncation (in bytes)
const MAX_OUTPUT_SIZE: usize = 100_000;

/// Truncation marker for large outputs
const TRUNCATION_MARKER: &str = "\n... [output truncated] ...\n";

/// Options for command execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Timeout duration (None = no timeout)
    pub timeout: Option<Duration>,
    /// Maximum output size before truncation
    pub max_output_size: usize,
    /// Registry the running command's process group is recorded in
    pub groups: Option<ChildGroups>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            env: HashMap::new(),
            timeout: None,
            max_output_size: MAX_OUTPUT_SIZE,
            groups: None,
        }
    }
}

impl From<&ExecConfig> for ExecOptions {
    fn from(config: &ExecConfig) -> Self {
        Self {
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            timeout: config.command_timeout(),
            max_output_size: config.max_output_size,
            groups: None,
        }
    }
}

impl ExecOptions {
    /// Create options with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set maximum output size
    pub fn with_max_output(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// Record running commands in `groups`
    pub fn with_groups(mut self, groups: ChildGroups) -> Self {
        self.groups = Some(groups);
        self
    }
}

/// Result of command execution
#[derive(Debug)]
pub struct ExecResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code if available
    pub exit_code: Option<i32>,
    /// Standard output (may be truncated)
    pub stdout: String,
    /// Whether stdout was truncated
    pub stdout_truncated: bool,
    /// Standard error (may be truncated)
    pub stderr: String,
    /// Whether stderr was truncated
    pub stderr_truncated: bool,
    /// Duration of execution
    pub duration: Duration,
}

/// Execute a command asynchronously
///
/// # Errors
/// * `ExecError::SpawnFailed` - If the command couldn't be spawned
/// * `ExecError::Timeout` - If the command outlived `options.timeout`
///
/// On unix the command leads its own process group, which is killed when
/// the command times out or this future is dropped before it exits.
pub async fn exec_command(
    program: &str,
    args: &[&str],
    options: &ExecOptions,
) -> Result<ExecResult, ExecError> {
    let start = Instant::now();
    let command_str = format!("{} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    tracing::debug!("Executing: {}", command_str);

    let child = cmd.spawn().map_err(|e| ExecError::SpawnFailed {
        command: command_str.clone(),
        error: e.to_string(),
    })?;
    let mut group = GroupGuard::new(child.id(), options.groups.as_ref());

    let result = if let Some(timeout_duration) = options.timeout {
        match timeout(timeout_duration, wait_for_output(child, options.max_output_size)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    command: command_str,
                    timeout_secs: timeout_duration.as_secs(),
                });
            }
        }
    } else {
        wait_for_output(child, options.max_output_size).await?
    };
    group.disarm();

    Ok(ExecResult {
        success: result.exit_code == Some(0),
        exit_code: result.exit_code,
        stdout: result.stdout,
        stdout_truncated: result.stdout_truncated,
        stderr: result.stderr,
        stderr_truncated: result.stderr_truncated,
        duration: start.elapsed(),
    })
}

/// Internal result from waiting for process output
struct WaitResult {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    stdout_truncated: bool,
    stderr_truncated: bool,
}

/// Wait for a child process and capture its output
async fn wait_for_output(
    mut child: tokio::process::Child,
    max_output_size: usize,
) -> Result<WaitResult, ExecError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Read both streams concurrently so neither pipe fills up
    let stdout_handle = tokio::spawn(async move {
        match stdout {
            Some(stdout) => read_and_truncate(stdout, max_output_size).await,
            None => (String::new(), false),
        }
    });

    let stderr_handle = tokio::spawn(async move {
        match stderr {
            Some(stderr) => read_and_truncate(stderr, max_output_size).await,
            None => (String::new(), false),
        }
    });

    let status = child.wait().await?;

    let (stdout, stdout_truncated) = stdout_handle
        .await
        .map_err(|e| std::io::Error::other(format!("stdout task failed: {}", e)))?;

    let (stderr, stderr_truncated) = stderr_handle
        .await
        .map_err(|e| std::io::Error::other(format!("stderr task failed: {}", e)))?;

    Ok(WaitResult {
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

/// Read from an async reader and truncate if too large
async fn read_and_truncate<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    max_size: usize,
) -> (String, bool) {
    let mut buf_reader = BufReader::new(reader);
    let mut output = String::with_capacity(max_size.min(64 * 1024));
    let mut line = String::with_capacity(4096);
    let mut truncated = false;

    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break,
            // keep draining after truncation so the child never blocks on a full pipe
            Ok(_) if truncated => {}
            Ok(_) => {
                if output.len() + line.len() > max_size {
                    let remaining = max_size.saturating_sub(output.len());
                    let cut = floor_char_boundary(&line, remaining);
                    output.push_str(&line[..cut]);
                    output.push_str(TRUNCATION_MARKER);
                    truncated = true;
                    continue;
                }
                output.push_str(&line);
            }
            Err(e) => {
                tracing::warn!("Error reading output: {}", e);
                break;
            }
        }
    }

    (output, truncated)
}

/// Largest index `<= at` that lies on a char boundary of `s`
fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut at = at.min(s.len());
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Execute a command from synchronous code
///
/// Builds a current-thread runtime for the call. Must not be called from
/// inside a tokio runtime; batch tasks run on their own thread, so this is
/// what they use.
pub fn exec_command_sync(
    program: &str,
    args: &[&str],
    options: &ExecOptions,
) -> Result<ExecResult, ExecError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| std::io::Error::other(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(exec_command(program, args, options))
}

/// A configured shell command that runs as one batch task
#[derive(Debug, Clone)]
pub struct CommandTask {
    name: String,
    shell: String,
    command: String,
    options: ExecOptions,
    echo: bool,
}

impl CommandTask {
    /// Build from a task entry and the shared execution settings
    pub fn new(task: &TaskConfig, exec: &ExecConfig) -> Self {
        Self {
            name: task.display_name().to_string(),
            shell: exec.shell.clone(),
            command: task.command.clone(),
            options: ExecOptions::from(exec),
            echo: true,
        }
    }

    /// Register the command's process group while it runs
    pub fn with_groups(mut self, groups: ChildGroups) -> Self {
        self.options = self.options.with_groups(groups);
        self
    }

    /// Whether captured output is written to this process' stdout/stderr
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Task name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the command now. A failure is logged and swallowed.
    ///
    /// Returns whether the command exited successfully.
    pub fn run(&self, index: usize) -> bool {
        tracing::info!("Running task #{} ({})", index, self.name);

        match exec_command_sync(&self.shell, &["-c", self.command.as_str()], &self.options) {
            Ok(result) => {
                if self.echo {
                    print!("{}", result.stdout);
                    eprint!("{}", result.stderr);
                }
                if result.success {
                    tracing::info!(
                        "Task #{} ({}) finished in {}ms",
                        index,
                        self.name,
                        result.duration.as_millis()
                    );
                } else {
                    tracing::warn!(
                        "Task #{} ({}) failed with exit code {:?}",
                        index,
                        self.name,
                        result.exit_code
                    );
                }
                result.success
            }
            Err(e) => {
                tracing::warn!("Task #{} ({}) failed: {}", index, self.name, e);
                false
            }
        }
    }

    /// Convert into a runner task
    pub fn into_task(self) -> Task {
        task(move |index| {
            self.run(index);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_options_default() {
        let options = ExecOptions::default();

        assert!(options.working_dir.is_none());
        assert!(options.env.is_empty());
        assert!(options.timeout.is_none());
        assert_eq!(options.max_output_size, MAX_OUTPUT_SIZE);
    }

    #[test]
    fn test_exec_options_builder() {
        let options = ExecOptions::in_dir("/tmp")
            .with_timeout(Duration::from_secs(60))
            .with_env("KEY", "value")
            .with_max_output(1000);

        assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.env.get("KEY"), Some(&"value".to_string()));
        assert_eq!(options.max_output_size, 1000);
    }

    #[test]
    fn test_exec_options_from_config() {
        let mut config = ExecConfig {
            command_timeout_secs: 7,
            max_output_size: 10,
            ..Default::default()
        };
        config.env.insert("A".to_string(), "1".to_string());

        let options = ExecOptions::from(&config);

        assert_eq!(options.timeout, Some(Duration::from_secs(7)));
        assert_eq!(options.max_output_size, 10);
        assert_eq!(options.env.get("A"), Some(&"1".to_string()));
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 10), 3);
    }

    #[tokio::test]
    async fn test_exec_command_success() {
        let result = exec_command("echo", &["hello world"], &ExecOptions::default()).await;

        match result {
            Ok(res) => {
                assert!(res.success);
                assert_eq!(res.exit_code, Some(0));
                assert!(res.stdout.contains("hello world"));
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: echo not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_failure() {
        let result = exec_command("false", &[], &ExecOptions::default()).await;

        match result {
            Ok(res) => {
                assert!(!res.success);
                assert_ne!(res.exit_code, Some(0));
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: false not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_with_env() {
        let options = ExecOptions::default().with_env("MY_VAR", "test_value");

        let result = exec_command("sh", &["-c", "echo $MY_VAR"], &options).await;

        match result {
            Ok(res) => {
                assert!(res.success);
                assert!(res.stdout.contains("test_value"));
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_timeout() {
        let options = ExecOptions::default().with_timeout(Duration::from_millis(100));

        let result = exec_command("sleep", &["10"], &options).await;

        match result {
            Err(ExecError::Timeout { timeout_secs, .. }) => {
                assert!(timeout_secs <= 1);
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sleep not available");
            }
            Ok(_) => panic!("Expected timeout error"),
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_output_truncation() {
        let options = ExecOptions::default().with_max_output(100);

        let result = exec_command(
            "sh",
            &["-c", "for i in $(seq 1 100); do echo 'line of output'; done"],
            &options,
        )
        .await;

        match result {
            Ok(res) => {
                assert!(res.stdout_truncated);
                assert!(res.stdout.contains("[output truncated]"));
                assert!(res.stdout.len() <= 100 + TRUNCATION_MARKER.len());
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_output_larger_than_pipe_buffer() {
        let options = ExecOptions::default()
            .with_max_output(500)
            .with_timeout(Duration::from_secs(10));

        let result = exec_command("sh", &["-c", "seq 1 200000"], &options).await;

        match result {
            Ok(res) => {
                assert!(res.success, "child should exit normally");
                assert!(res.stdout_truncated);
                assert!(res.stdout.len() <= 500 + TRUNCATION_MARKER.len());
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = ExecOptions::in_dir(dir.path());

        let result = exec_command("sh", &["-c", "touch marker"], &options).await;

        match result {
            Ok(res) => {
                assert!(res.success);
                assert!(dir.path().join("marker").exists());
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_spawn_failed() {
        let result = exec_command("nonexistent_command_12345", &[], &ExecOptions::default()).await;

        match result {
            Err(ExecError::SpawnFailed { command, .. }) => {
                assert!(command.contains("nonexistent_command_12345"));
            }
            _ => panic!("Expected SpawnFailed error"),
        }
    }

    #[test]
    fn test_exec_command_sync() {
        let result = exec_command_sync("echo", &["sync test"], &ExecOptions::default());

        match result {
            Ok(res) => {
                assert!(res.success);
                assert!(res.stdout.contains("sync test"));
            }
            Err(ExecError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: echo not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_command_task_name_defaults_to_command() {
        let task = CommandTask::new(&TaskConfig::command("echo hi"), &ExecConfig::default());
        assert_eq!(task.name(), "echo hi");
    }

    #[test]
    fn test_command_task_run_reports_status() {
        let exec = ExecConfig::default();

        let ok = CommandTask::new(&TaskConfig::command("true"), &exec).with_echo(false);
        assert!(ok.run(0));

        let failing = CommandTask::new(&TaskConfig::command("exit 3"), &exec).with_echo(false);
        assert!(!failing.run(1));
    }

    #[test]
    fn test_command_task_writes_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let exec = ExecConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let task = CommandTask::new(
            &TaskConfig {
                name: Some("write".to_string()),
                command: "echo $0 > out.txt".to_string(),
            },
            &exec,
        )
        .with_echo(false);

        (task.into_task())(0);

        assert!(dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_command_task_swallows_spawn_failure() {
        let exec = ExecConfig {
            shell: "nonexistent_shell_12345".to_string(),
            ..Default::default()
        };
        let task = CommandTask::new(&TaskConfig::command("true"), &exec).with_echo(false);

        assert!(!task.run(0));
    }
}
