//! Remote session layer
//!
//! Provides the connection abstraction the orchestrator drives for every
//! SSH-backed host operation:
//! - [`RemoteSession`]: one authenticated connection to one host
//! - [`SessionFactory`]: hands each worker a fresh, unconnected session
//! - [`OpenSshSession`]: implementation on top of the system `ssh` client

mod error;
mod openssh;

use std::time::Duration;

use async_trait::async_trait;

use crate::operation::Credentials;

pub use error::SessionError;
pub use openssh::{OpenSshFactory, OpenSshSession, SshClientOptions};

/// A single authenticated connection to one host
///
/// Calls after [`RemoteSession::close`] fail with [`SessionError::NotConnected`].
#[async_trait]
pub trait RemoteSession: Send {
    /// Open and authenticate the connection
    async fn connect(
        &mut self,
        addr: &str,
        port: u16,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Run a shell command and return its stdout
    async fn run(&mut self, command: &str) -> Result<String, SessionError>;

    /// Run a shell command with `input` on its stdin and return its stdout
    async fn run_with_input(
        &mut self,
        command: &str,
        input: &[u8],
    ) -> Result<String, SessionError>;

    /// Write `bytes` to `remote_path`, replacing any existing file
    async fn upload(&mut self, bytes: &[u8], remote_path: &str) -> Result<(), SessionError>;

    /// Read the file at `remote_path`
    async fn download(&mut self, remote_path: &str) -> Result<Vec<u8>, SessionError>;

    /// Tear the connection down; safe to call more than once
    async fn close(&mut self);
}

/// Creates one unconnected session per host operation
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Box<dyn RemoteSession>;
}
