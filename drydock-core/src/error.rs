//! Error types for host interaction

use std::time::Duration;
use thiserror::Error;

use crate::domain::service::ServiceStatus;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Failures surfaced by the command runner and service controller
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The process could not be spawned at all
    #[error("Failed to launch '{command}': {reason}")]
    LaunchFailed { command: String, reason: String },

    /// The process ran past its deadline and was killed
    #[error("Command timed out after {timeout:?}: {command}")]
    TimeoutExceeded { command: String, timeout: Duration },

    /// The process ran but exited non-zero
    #[error("Command failed (exit code {exit_code}): {command}: {}", stderr.trim())]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
        stdout: String,
    },

    /// An expected file or process is absent
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A service did not reach the requested status in time
    #[error("Service '{service}' did not reach {target} within {waited:?}")]
    ConvergenceTimeout {
        service: String,
        target: ServiceStatus,
        waited: Duration,
    },
}

impl HostError {
    /// Create a launch error from the command text and the underlying cause
    pub fn launch_failed(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::LaunchFailed {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::TimeoutExceeded { .. } | Self::ConvergenceTimeout { .. }
        )
    }

    /// Exit code of a command that ran and failed
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message_trims_stderr() {
        let err = HostError::CommandFailed {
            command: "docker system prune".to_string(),
            exit_code: 1,
            stderr: "daemon not reachable\n".to_string(),
            stdout: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Command failed (exit code 1): docker system prune: daemon not reachable"
        );
        assert_eq!(err.exit_code(), Some(1));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_classification() {
        let err = HostError::TimeoutExceeded {
            command: "docker info".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_timeout());
        assert_eq!(err.exit_code(), None);

        let err = HostError::ConvergenceTimeout {
            service: "WSLService".to_string(),
            target: ServiceStatus::Running,
            waited: Duration::from_secs(60),
        };
        assert!(err.is_timeout());
    }
}
