//! Batch orchestration
//!
//! The [`Orchestrator`] wires the pieces together for one run: validate,
//! plan tasks, feed them through a [`WorkerPool`], wait for the pool to drain
//! and hand back the aggregated [`BatchResult`]. It holds no state between
//! runs beyond its settings and collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::address::TargetSet;
use crate::config::Config;
use crate::error::InputError;
use crate::operation::{ExecContext, HostOperation, OperationSpec};
use crate::params::from_parameter_map;
use crate::pool::WorkerPool;
use crate::result::{BatchResult, ResultAggregator};
use crate::scanner::{NmapScanner, PortScanner};
use crate::session::{OpenSshFactory, SessionFactory};
use crate::store::ResultSink;

/// Knobs for one orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub worker_count: usize,
    pub exec: ExecContext,
    /// Hosts not started this long after the run began are cancelled
    pub batch_deadline: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            worker_count: 5,
            exec: ExecContext::default(),
            batch_deadline: None,
        }
    }
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            exec: config.exec_context(),
            batch_deadline: config.batch_deadline(),
        }
    }
}

/// Runs operations across target sets
pub struct Orchestrator {
    settings: RunSettings,
    sessions: Arc<dyn SessionFactory>,
    scanner: Arc<dyn PortScanner>,
}

impl Orchestrator {
    pub fn new(
        settings: RunSettings,
        sessions: Arc<dyn SessionFactory>,
        scanner: Arc<dyn PortScanner>,
    ) -> Self {
        Self {
            settings,
            sessions,
            scanner,
        }
    }

    /// Orchestrator backed by the system `ssh` and `nmap`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RunSettings::from(config),
            Arc::new(OpenSshFactory::new(config.ssh_client_options())),
            Arc::new(NmapScanner::new(config.nmap_path.clone())),
        )
    }

    /// Replace the settings, keeping the collaborators
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run `spec` against every target
    ///
    /// Input problems are reported before any host is contacted. Per-host
    /// failures are data in the returned result, never errors.
    pub async fn run(
        &self,
        spec: OperationSpec,
        targets: TargetSet,
    ) -> Result<BatchResult, InputError> {
        spec.validate()?;
        if targets.is_empty() {
            return Err(InputError::MissingField("targets".to_string()));
        }

        let spec = Arc::new(spec);
        let exec = Arc::new(self.settings.exec.clone());
        let results = Arc::new(ResultAggregator::new(spec.summary()));
        let tasks = HostOperation::plan(&spec, &targets, self.settings.worker_count);

        tracing::info!(
            kind = %spec.kind(),
            hosts = targets.len(),
            tasks = tasks.len(),
            workers = self.settings.worker_count,
            "Starting batch"
        );

        let mut pool = WorkerPool::new(self.settings.worker_count);
        if let Some(deadline) = self.settings.batch_deadline {
            pool = pool.with_deadline(Instant::now() + deadline);
        }

        for task in tasks {
            let task = Arc::new(task);

            let abort_task = Arc::clone(&task);
            let abort_results = Arc::clone(&results);

            let spec = Arc::clone(&spec);
            let exec = Arc::clone(&exec);
            let sessions = Arc::clone(&self.sessions);
            let scanner = Arc::clone(&self.scanner);
            let results = Arc::clone(&results);

            pool.submit(
                async move {
                    task.execute(
                        &spec,
                        &exec,
                        sessions.as_ref(),
                        scanner.as_ref(),
                        &results,
                    )
                    .await;
                },
                move |cause| abort_task.abort(cause, &abort_results),
            );
        }

        pool.drain().await;

        let result = results.snapshot();
        tracing::info!(
            kind = %result.operation.kind,
            succeeded = result.succeeded(),
            failed = result.failed(),
            scan_facts = result.scan_facts.len(),
            "Batch finished"
        );
        Ok(result)
    }

    /// Run from a flat parameter map
    pub async fn run_parameters(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<BatchResult, InputError> {
        let (spec, targets) = from_parameter_map(params)?;
        self.run(spec, targets).await
    }

    /// Run, then hand the result to `sink`
    ///
    /// A failing sink is logged and does not affect the returned result.
    pub async fn run_and_persist(
        &self,
        spec: OperationSpec,
        targets: TargetSet,
        sink: &dyn ResultSink,
    ) -> Result<BatchResult, InputError> {
        let result = self.run(spec, targets).await?;
        if let Err(e) = sink.store(&result) {
            tracing::warn!(error = %e, "Failed to store batch result");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = Config {
            worker_count: 8,
            batch_deadline_secs: Some(60),
            command_timeout_secs: 10,
            ..Config::default()
        };
        let settings = RunSettings::from(&config);
        assert_eq!(settings.worker_count, 8);
        assert_eq!(settings.batch_deadline, Some(Duration::from_secs(60)));
        assert_eq!(settings.exec.command_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overridden_settings_replace_config_values() {
        let config = Config {
            worker_count: 8,
            ..Config::default()
        };
        let orchestrator = Orchestrator::from_config(&config);
        assert_eq!(orchestrator.settings().worker_count, 8);

        let settings = RunSettings {
            worker_count: 2,
            batch_deadline: Some(Duration::from_secs(5)),
            ..RunSettings::from(&config)
        };
        let orchestrator = orchestrator.with_settings(settings.clone());
        assert_eq!(orchestrator.settings(), &settings);
    }

    #[test]
    fn default_settings_match_default_config() {
        assert_eq!(RunSettings::default(), RunSettings::from(&Config::default()));
    }
}
