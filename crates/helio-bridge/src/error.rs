//! Error types for the engine bridge.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The failure taxonomy every bridge call ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No candidate executable for a capability could be started.
    CapabilityUnavailable,
    /// The command name is not in the registry.
    UnknownCommand,
    /// The payload could not be encoded for the command's transport.
    MarshalFailed,
    /// The engine process could not be spawned.
    EngineUnavailable,
    /// The engine did not finish within its timeout and was killed.
    Timeout,
    /// The engine ran and reported failure.
    EngineError,
    /// The engine exited cleanly but its output could not be interpreted.
    MalformedResponse,
}

impl ErrorKind {
    /// Stable identifier used in envelopes and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "CapabilityUnavailable",
            Self::UnknownCommand => "UnknownCommand",
            Self::MarshalFailed => "MarshalFailed",
            Self::EngineUnavailable => "EngineUnavailable",
            Self::Timeout => "Timeout",
            Self::EngineError => "EngineError",
            Self::MalformedResponse => "MalformedResponse",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::EngineError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed candidate during capability resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttempt {
    /// Candidate as written (e.g. `py -3`).
    pub candidate: String,
    /// Why it was rejected.
    pub error: String,
}

impl fmt::Display for CandidateAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.error)
    }
}

fn format_attempts(attempts: &[CandidateAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidates configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[allow(clippy::ref_option)]
fn exit_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

/// Errors produced by the engine bridge.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// No candidate could be started.
    #[error("capability '{capability}' unavailable (tried {})", format_attempts(.attempts))]
    CapabilityUnavailable {
        /// Capability name.
        capability: String,
        /// Every candidate tried, in order.
        attempts: Vec<CandidateAttempt>,
    },

    /// The command is not registered.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The payload does not fit the command's transport.
    #[error("cannot marshal payload for '{command}': {message}")]
    MarshalFailed {
        /// Command name.
        command: String,
        /// What went wrong.
        message: String,
    },

    /// The engine process could not be started.
    #[error("engine unavailable: {message}")]
    EngineUnavailable {
        /// OS error text.
        message: String,
    },

    /// The engine ran past its deadline.
    #[error("engine timed out after {timeout:?}")]
    Timeout {
        /// The configured timeout.
        timeout: Duration,
    },

    /// The engine reported failure.
    #[error("engine error ({}): {message}", exit_label(.exit_code))]
    EngineError {
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Diagnostic text from the engine.
        message: String,
    },

    /// The engine's output could not be interpreted.
    #[error("malformed engine response: {message}")]
    MalformedResponse {
        /// What was wrong, including the truncated output.
        message: String,
    },
}

impl BridgeError {
    /// The taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::MarshalFailed { .. } => ErrorKind::MarshalFailed,
            Self::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::EngineError { .. } => ErrorKind::EngineError,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    pub(crate) fn marshal(command: &str, message: impl Into<String>) -> Self {
        Self::MarshalFailed {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::EngineError.is_retryable());
        assert!(!ErrorKind::UnknownCommand.is_retryable());
        assert!(!ErrorKind::MarshalFailed.is_retryable());
        assert!(!ErrorKind::CapabilityUnavailable.is_retryable());
    }

    #[test]
    fn test_kind_mapping() {
        let err = BridgeError::Timeout {
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("2s"));

        let err = BridgeError::UnknownCommand("nope".into());
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
        assert_eq!(err.to_string(), "unknown command: nope");
    }

    #[test]
    fn test_engine_error_display() {
        let err = BridgeError::EngineError {
            exit_code: Some(7),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "engine error (exit code 7): boom");

        let err = BridgeError::EngineError {
            exit_code: None,
            message: "killed".into(),
        };
        assert_eq!(err.to_string(), "engine error (no exit code): killed");
    }

    #[test]
    fn test_capability_unavailable_lists_attempts() {
        let err = BridgeError::CapabilityUnavailable {
            capability: "engine-interpreter".into(),
            attempts: vec![
                CandidateAttempt {
                    candidate: "python3".into(),
                    error: "not found".into(),
                },
                CandidateAttempt {
                    candidate: "python".into(),
                    error: "not found".into(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("python3: not found"));
        assert!(text.contains("python: not found"));
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::MalformedResponse).unwrap();
        assert_eq!(json, "\"MalformedResponse\"");
    }
}
