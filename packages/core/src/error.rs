//! Batch-level error types
//!
//! Two families live here. [`InputError`] covers malformed caller input and
//! aborts a run before any host is contacted. [`FailureReason`] classifies a
//! single host's failure and is carried as data inside a `HostOutcome`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in caller-supplied parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// An IP range expression could not be parsed
    #[error("Invalid range format: {0}")]
    InvalidRangeFormat(String),

    /// Credentials are missing, ambiguous or inconsistent
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A required parameter was not supplied
    #[error("Missing field: {0}")]
    MissingField(String),
}

/// Why a single host's operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Could not open a session (refused, auth failure, timeout)
    ConnectionError,
    /// The host is reachable but not fit for the operation
    PreconditionError,
    /// A remote command, transfer or scanner invocation failed
    CommandExecutionError,
    /// The batch deadline expired before the host was started
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::ConnectionError => write!(f, "connection error"),
            FailureReason::PreconditionError => write!(f, "precondition failed"),
            FailureReason::CommandExecutionError => write!(f, "command failed"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_error_displays_detail() {
        let err = InputError::MissingField("username".to_string());
        assert_eq!(err.to_string(), "Missing field: username");

        let err = InputError::InvalidRangeFormat("10.0.0.1/40".to_string());
        assert!(err.to_string().contains("10.0.0.1/40"));
    }

    #[test]
    fn failure_reason_serializes_screaming_snake() {
        let json = serde_json::to_string(&FailureReason::CommandExecutionError).unwrap();
        assert_eq!(json, "\"COMMAND_EXECUTION_ERROR\"");
    }
}
