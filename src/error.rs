//! Error types for batchguard
//!
//! The runner reports exactly two failure conditions. Command execution has
//! its own error type because a failing command never fails the batch.

use serde::Serialize;
use thiserror::Error;

/// Terminal failure of a batch run
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerError {
    /// The deadline elapsed before the batch finished
    #[error("timeout")]
    Timeout,

    /// A cancellation was observed between two tasks
    #[error("interrupted")]
    Interrupted,
}

impl RunnerError {
    /// Process exit code a wrapper should use for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunnerError::Timeout => 1,
            RunnerError::Interrupted => 2,
        }
    }

    /// Stable snake_case identifier, used in JSON output
    pub fn error_type(&self) -> &'static str {
        match self {
            RunnerError::Timeout => "timeout",
            RunnerError::Interrupted => "interrupted",
        }
    }
}

/// Errors from running a single shell command
#[derive(Error, Debug)]
pub enum ExecError {
    /// Failed to spawn the command
    #[error("Failed to spawn command: {command}")]
    SpawnFailed { command: String, error: String },

    /// Command exceeded its own timeout
    #[error("Command timed out after {timeout_secs}s: {command}")]
    Timeout { command: String, timeout_secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializable error info for JSON output
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub exit_code: u8,
}

impl From<&RunnerError> for ErrorInfo {
    fn from(err: &RunnerError) -> Self {
        let suggestion = match err {
            RunnerError::Timeout => {
                "Increase [runner].timeout_secs or split the batch into smaller runs"
            }
            RunnerError::Interrupted => {
                "The batch was stopped by a shutdown signal; rerun it when ready"
            }
        };

        ErrorInfo {
            message: format!("Batch {}", err),
            error_type: err.error_type().to_string(),
            suggestion: Some(suggestion.to_string()),
            exit_code: err.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_error_display() {
        assert_eq!(RunnerError::Timeout.to_string(), "timeout");
        assert_eq!(RunnerError::Interrupted.to_string(), "interrupted");
    }

    #[test]
    fn test_runner_error_exit_codes_are_distinct() {
        assert_eq!(RunnerError::Timeout.exit_code(), 1);
        assert_eq!(RunnerError::Interrupted.exit_code(), 2);
    }

    #[test]
    fn test_exec_timeout_error() {
        let err = ExecError::Timeout {
            command: "sleep 10".to_string(),
            timeout_secs: 5,
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_error_info_from_timeout() {
        let info = ErrorInfo::from(&RunnerError::Timeout);

        assert_eq!(info.error_type, "timeout");
        assert_eq!(info.exit_code, 1);
        assert!(info.suggestion.unwrap().contains("timeout_secs"));
    }

    #[test]
    fn test_error_info_serialization() {
        let info = ErrorInfo::from(&RunnerError::Interrupted);

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"error_type\":\"interrupted\""));
        assert!(json.contains("\"exit_code\":2"));
    }

    #[test]
    fn test_error_info_skips_empty_suggestion() {
        let info = ErrorInfo {
            message: "Test".to_string(),
            error_type: "test".to_string(),
            suggestion: None,
            exit_code: 3,
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("suggestion"));
    }
}
