//! Session error types
//!
//! Errors that can occur while talking to a remote host.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`super::RemoteSession`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Failed to spawn the SSH client process
    #[error("Failed to spawn SSH: {0}")]
    Spawn(String),

    /// The host could not be reached
    #[error("SSH connection failed: {0}")]
    ConnectionFailed(String),

    /// The host rejected the credentials
    #[error("SSH authentication failed for {user}@{host}")]
    AuthFailed { user: String, host: String },

    /// A call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A remote command exited unsuccessfully
    #[error("Remote command failed (exit {}): {stderr}", .status.map(|s| s.to_string()).unwrap_or_else(|| "signal".to_string()))]
    CommandFailed {
        status: Option<i32>,
        stderr: String,
    },

    /// A file transfer failed
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// A call was made before `connect` succeeded
    #[error("Session is not connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_displays_correctly() {
        let err = SessionError::AuthFailed {
            user: "root".to_string(),
            host: "10.0.0.1".to_string(),
        };
        assert_eq!(err.to_string(), "SSH authentication failed for root@10.0.0.1");

        let err = SessionError::CommandFailed {
            status: Some(100),
            stderr: "E: Unable to locate package".to_string(),
        };
        assert!(err.to_string().contains("exit 100"));

        let err = SessionError::CommandFailed {
            status: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit signal"));
    }
}
