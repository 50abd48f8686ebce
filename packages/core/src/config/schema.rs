//! Configuration schema for netinv
//!
//! Defines the structure and defaults for the config.json file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::{DEFAULT_SSH_PORT, ExecContext};
use crate::session::SshClientOptions;

/// Main configuration structure for netinv
///
/// Serialized to/from `~/.config/netinv/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config file version for migrations
    pub version: u32,

    /// Concurrent workers per batch (default: 5)
    /// Fixed per run, independent of how many hosts are targeted
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// SSH port used when a run does not name one (default: 22)
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Seconds allowed for opening and authenticating a session (default: 30)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds allowed for a single remote command or upload (default: 600)
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Seconds allowed for one scanner invocation (default: 900)
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Seconds after which hosts that have not started are cancelled
    /// (default: None, no deadline)
    #[serde(default)]
    pub batch_deadline_secs: Option<u64>,

    /// Directory on target hosts where packages are staged (default: "/tmp/")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// nmap executable (default: "nmap")
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// ssh executable (default: "ssh")
    #[serde(default = "default_ssh_path")]
    pub ssh_path: String,

    /// sshpass executable, used for password logins (default: "sshpass")
    #[serde(default = "default_sshpass_path")]
    pub sshpass_path: String,

    /// Login user when none is given (default: None, uses the local user)
    #[serde(default)]
    pub default_user: Option<String>,

    /// Store every batch result under the data directory (default: true)
    #[serde(default = "default_save_results")]
    pub save_results: bool,
}

fn default_worker_count() -> usize {
    5
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    600
}

fn default_scan_timeout_secs() -> u64 {
    900
}

fn default_staging_dir() -> String {
    "/tmp/".to_string()
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_ssh_path() -> String {
    "ssh".to_string()
}

fn default_sshpass_path() -> String {
    "sshpass".to_string()
}

fn default_save_results() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            worker_count: default_worker_count(),
            ssh_port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            scan_timeout_secs: default_scan_timeout_secs(),
            batch_deadline_secs: None,
            staging_dir: default_staging_dir(),
            nmap_path: default_nmap_path(),
            ssh_path: default_ssh_path(),
            sshpass_path: default_sshpass_path(),
            default_user: None,
            save_results: default_save_results(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-task deadlines and paths derived from this config
    pub fn exec_context(&self) -> ExecContext {
        ExecContext {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
            staging_dir: self.staging_dir.clone(),
        }
    }

    pub fn ssh_client_options(&self) -> SshClientOptions {
        SshClientOptions {
            ssh_path: self.ssh_path.clone(),
            sshpass_path: self.sshpass_path.clone(),
        }
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }

    /// Login user: the configured default, else the local account
    pub fn login_user(&self) -> String {
        self.default_user
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(whoami::username)
    }
}
