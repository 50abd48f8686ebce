//! Per-host outcomes and batch aggregation
//!
//! Workers hand finished outcomes to a shared [`ResultAggregator`]; the
//! orchestrator takes a [`BatchResult`] snapshot once the pool has drained.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::TargetSet;
use crate::error::FailureReason;
use crate::operation::OperationSummary;
use crate::scanner::ScanFact;

/// Result of one operation against one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOutcome {
    pub host: String,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<FailureReason>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl HostOutcome {
    pub fn success(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            success: true,
            reason: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        host: impl Into<String>,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            success: false,
            reason: Some(reason),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub operation: OperationSummary,
    /// In completion order
    pub outcomes: Vec<HostOutcome>,
    #[serde(default)]
    pub scan_facts: Vec<ScanFact>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Hosts whose operation failed, ready to feed a follow-up run
    pub fn failed_hosts(&self) -> TargetSet {
        TargetSet::from_hosts(
            self.outcomes
                .iter()
                .filter(|o| !o.success)
                .map(|o| o.host.clone()),
        )
    }

    pub fn outcome_for(&self, host: &str) -> Option<&HostOutcome> {
        self.outcomes.iter().find(|o| o.host == host)
    }
}

#[derive(Debug, Default)]
struct Collected {
    outcomes: Vec<HostOutcome>,
    scan_facts: Vec<ScanFact>,
}

/// Thread-safe collector shared by all workers of a batch
#[derive(Debug)]
pub struct ResultAggregator {
    operation: OperationSummary,
    started_at: DateTime<Utc>,
    inner: Mutex<Collected>,
}

impl ResultAggregator {
    pub fn new(operation: OperationSummary) -> Self {
        Self {
            operation,
            started_at: Utc::now(),
            inner: Mutex::new(Collected::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        // A worker that panicked mid-push leaves the vectors intact
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, outcome: HostOutcome) {
        if !outcome.success {
            tracing::warn!(
                host = %outcome.host,
                reason = ?outcome.reason,
                "{}",
                outcome.message
            );
        }
        self.lock().outcomes.push(outcome);
    }

    pub fn record_scan(&self, fact: ScanFact) {
        self.lock().scan_facts.push(fact);
    }

    pub fn len(&self) -> usize {
        self.lock().outcomes.len()
    }

    /// Whether an outcome for `host` was already recorded
    pub fn has_outcome(&self, host: &str) -> bool {
        self.lock().outcomes.iter().any(|o| o.host == host)
    }

    /// Whether a scan fact for `host` was already recorded
    pub fn has_scan_fact(&self, host: &str) -> bool {
        self.lock().scan_facts.iter().any(|f| f.host == host)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep copy of everything recorded so far
    pub fn snapshot(&self) -> BatchResult {
        let inner = self.lock();
        BatchResult {
            operation: self.operation.clone(),
            outcomes: inner.outcomes.clone(),
            scan_facts: inner.scan_facts.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
