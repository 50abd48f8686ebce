//! Batch result persistence
//!
//! [`ResultSink`] is where the orchestrator hands finished batches.
//! [`JsonResultStore`] keeps one pretty-printed JSON file per batch, named
//! `<kind>-<started_at>-<suffix>.json` so that names sort chronologically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::operation::OperationKind;
use crate::result::BatchResult;

/// Errors from storing or loading batch results
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed result file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No stored {0} results")]
    NotFound(OperationKind),
}

/// Destination for finished batches
pub trait ResultSink: Send + Sync {
    fn store(&self, result: &BatchResult) -> Result<(), StoreError>;
}

/// One JSON file per batch under a directory
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored files for `kind`, oldest first
    pub fn list(&self, kind: OperationKind) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let prefix = format!("{kind}-");
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Most recent batch of `kind`
    pub fn load_latest(&self, kind: OperationKind) -> Result<BatchResult, StoreError> {
        let path = self
            .list(kind)?
            .pop()
            .ok_or(StoreError::NotFound(kind))?;
        load(&path)
    }
}

impl ResultSink for JsonResultStore {
    fn store(&self, result: &BatchResult) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let name = format!(
            "{}-{}-{:04x}.json",
            result.operation.kind,
            result.started_at.format("%Y%m%dT%H%M%S%.3fZ"),
            rand::random::<u16>()
        );
        let path = self.dir.join(name);

        let json = serde_json::to_string_pretty(result).map_err(|source| StoreError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Stored batch result: {}", path.display());
        Ok(())
    }
}

fn load(path: &Path) -> Result<BatchResult, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationSummary;
    use crate::result::{HostOutcome, ResultAggregator};
    use crate::scanner::ScanFact;
    use chrono::{Duration, Utc};

    fn batch(kind: OperationKind, minutes_ago: i64, host: &str) -> BatchResult {
        let agg = ResultAggregator::new(OperationSummary {
            kind,
            detail: "test".to_string(),
            access_method: None,
            username: None,
            port: 22,
        });
        agg.record(HostOutcome::success(host, "ok"));
        if kind == OperationKind::Scan {
            agg.record_scan(ScanFact::unreachable(host));
        }
        let mut result = agg.snapshot();
        result.started_at = Utc::now() - Duration::minutes(minutes_ago);
        result
    }

    #[test]
    fn load_latest_picks_newest_of_kind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("results"));

        store.store(&batch(OperationKind::Scan, 30, "10.0.0.1")).unwrap();
        store.store(&batch(OperationKind::Scan, 5, "10.0.0.2")).unwrap();
        store.store(&batch(OperationKind::Install, 1, "10.0.0.3")).unwrap();

        let latest = store.load_latest(OperationKind::Scan).unwrap();
        assert_eq!(latest.outcomes[0].host, "10.0.0.2");
        assert_eq!(latest.scan_facts.len(), 1);
        assert_eq!(store.list(OperationKind::Scan).unwrap().len(), 2);
        assert_eq!(store.list(OperationKind::Install).unwrap().len(), 1);
    }

    #[test]
    fn missing_directory_means_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("absent"));

        assert!(store.list(OperationKind::Distribute).unwrap().is_empty());
        assert!(matches!(
            store.load_latest(OperationKind::Distribute),
            Err(StoreError::NotFound(OperationKind::Distribute))
        ));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan-20240101T000000.000Z-0000.json"), "{").unwrap();
        let store = JsonResultStore::new(dir.path());

        assert!(matches!(
            store.load_latest(OperationKind::Scan),
            Err(StoreError::Format { .. })
        ));
    }
}
