//! Port scanning
//!
//! [`PortScanner`] is the collaborator a scan task hands its sub-range to.
//! [`NmapScanner`] runs the system `nmap` and parses its XML report.

mod nmap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operation::Credentials;

pub use nmap::{NmapScanner, parse_report};

/// What a scan learned about one host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFact {
    pub host: String,
    pub reachable: bool,
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Open ports as `port/proto service`
    #[serde(default)]
    pub open_ports: Vec<String>,
    #[serde(default)]
    pub os_guesses: Vec<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub distance: Option<u32>,
    /// Seconds since boot, when OS detection could tell
    #[serde(default)]
    pub uptime_secs: Option<u64>,
}

impl ScanFact {
    /// Fact for a host the scanner reported nothing about
    pub fn unreachable(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }
}

/// Errors raised by a [`PortScanner`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Scanner binary could not be started
    #[error("Failed to start scanner: {0}")]
    Spawn(String),

    /// Scanner exited unsuccessfully
    #[error("Scanner failed (exit {}): {stderr}", .status.map(|s| s.to_string()).unwrap_or_else(|| "signal".to_string()))]
    Failed {
        status: Option<i32>,
        stderr: String,
    },

    /// Scanner output could not be parsed
    #[error("Unreadable scan report: {0}")]
    Parse(String),
}

/// Scans one sub-range of addresses
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Scan the hosts of `range_expr` (a range expression or a comma list)
    ///
    /// Returns facts only for hosts the scanner reported on; the caller fills
    /// in the rest of the sub-range as unreachable.
    async fn scan(
        &self,
        range_expr: &str,
        ports: Option<&str>,
        sudo: Option<&Credentials>,
        timing: Option<&str>,
    ) -> Result<Vec<ScanFact>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_fact_is_empty() {
        let fact = ScanFact::unreachable("10.0.0.9");
        assert_eq!(fact.host, "10.0.0.9");
        assert!(!fact.reachable);
        assert!(fact.open_ports.is_empty());
        assert!(fact.distance.is_none());
    }

    #[test]
    fn scan_fact_deserializes_with_missing_fields() {
        let fact: ScanFact = serde_json::from_str(r#"{"host":"10.0.0.1","reachable":true}"#).unwrap();
        assert!(fact.reachable);
        assert!(fact.hostnames.is_empty());
    }
}
