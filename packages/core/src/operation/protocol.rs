//! Per-host protocol
//!
//! Install and distribute walk every host through
//! `Init → Connected → Verified → Acting → Done`. The state a failure happens
//! in decides its [`FailureReason`]: while connecting it is a connection
//! error, while verifying a precondition error, afterwards a command error.
//! The session is closed on every path out.
//!
//! Scan tasks own a whole sub-range and talk to a [`PortScanner`] instead of
//! opening sessions.

use std::time::Duration;

use tokio::time::timeout;

use super::commands;
use super::spec::{Credentials, Operation, OperationSpec, PackageSource, normalize_directory};
use crate::address::{TargetSet, to_range_expr};
use crate::error::FailureReason;
use crate::partition::partition;
use crate::pool::AbortCause;
use crate::result::{HostOutcome, ResultAggregator};
use crate::scanner::{PortScanner, ScanFact};
use crate::session::{RemoteSession, SessionError, SessionFactory};

/// Where a host is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Init,
    Connected,
    Verified,
    Acting,
    Done,
}

impl ProtocolState {
    /// Classification for a failure raised while in this state
    pub fn failure_reason(self) -> FailureReason {
        match self {
            ProtocolState::Init => FailureReason::ConnectionError,
            ProtocolState::Connected => FailureReason::PreconditionError,
            ProtocolState::Verified | ProtocolState::Acting | ProtocolState::Done => {
                FailureReason::CommandExecutionError
            }
        }
    }
}

/// Deadlines and host-side paths shared by every task of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub scan_timeout: Duration,
    /// Directory on the target where packages are staged before `dpkg -i`
    pub staging_dir: String,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(600),
            scan_timeout: Duration::from_secs(900),
            staging_dir: "/tmp/".to_string(),
        }
    }
}

/// One unit of work handed to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOperation {
    Install { host: String },
    Distribute { host: String },
    /// A contiguous sub-range handed to the port scanner
    Scan { hosts: Vec<String> },
}

impl HostOperation {
    /// Split a batch into tasks
    ///
    /// Install and distribute get one task per host. Scans get at most
    /// `worker_count` contiguous sub-ranges.
    pub fn plan(spec: &OperationSpec, targets: &TargetSet, worker_count: usize) -> Vec<Self> {
        match spec.operation {
            Operation::Install { .. } => targets
                .iter()
                .map(|host| HostOperation::Install {
                    host: host.to_string(),
                })
                .collect(),
            Operation::Distribute { .. } => targets
                .iter()
                .map(|host| HostOperation::Distribute {
                    host: host.to_string(),
                })
                .collect(),
            Operation::Scan { .. } => partition(targets.hosts(), worker_count)
                .into_iter()
                .map(|hosts| HostOperation::Scan { hosts })
                .collect(),
        }
    }

    /// Hosts this task reports on
    pub fn hosts(&self) -> &[String] {
        match self {
            HostOperation::Install { host } | HostOperation::Distribute { host } => {
                std::slice::from_ref(host)
            }
            HostOperation::Scan { hosts } => hosts,
        }
    }

    /// Run the task and record its outcomes
    pub async fn execute(
        &self,
        spec: &OperationSpec,
        ctx: &ExecContext,
        sessions: &dyn SessionFactory,
        scanner: &dyn PortScanner,
        results: &ResultAggregator,
    ) {
        match self {
            HostOperation::Install { host } | HostOperation::Distribute { host } => {
                let outcome = match &spec.credentials {
                    Some(credentials) => {
                        Protocol::new(host, spec, credentials, ctx, sessions.create())
                            .run()
                            .await
                    }
                    None => HostOutcome::failure(
                        host.as_str(),
                        FailureReason::ConnectionError,
                        "no login credentials",
                    ),
                };
                results.record(outcome);
            }
            HostOperation::Scan { hosts } => match &spec.operation {
                Operation::Scan { ports, timing, sudo } => {
                    let request = ScanRequest {
                        ports: ports.as_deref(),
                        timing: timing.as_deref(),
                        sudo: sudo.as_ref(),
                    };
                    run_scan(hosts, request, ctx, scanner, results).await;
                }
                _ => {
                    for host in hosts {
                        results.record(HostOutcome::failure(
                            host.as_str(),
                            FailureReason::PreconditionError,
                            format!("{} operations are not scans", spec.kind()),
                        ));
                    }
                }
            },
        }
    }

    /// Record failures for every owned host that has no outcome yet
    pub fn abort(&self, cause: AbortCause, results: &ResultAggregator) {
        let (reason, message) = match cause {
            AbortCause::Cancelled => (
                FailureReason::Cancelled,
                "batch deadline passed before the host was started".to_string(),
            ),
            AbortCause::Panicked(panic) => (
                FailureReason::CommandExecutionError,
                format!("worker panicked: {panic}"),
            ),
        };

        let scanning = matches!(self, HostOperation::Scan { .. });
        for host in self.hosts() {
            if results.has_outcome(host) || (scanning && results.has_scan_fact(host)) {
                continue;
            }
            results.record(HostOutcome::failure(host.as_str(), reason, message.clone()));
            if scanning {
                results.record_scan(ScanFact::unreachable(host.as_str()));
            }
        }
    }
}

/// Why a protocol step stopped
struct StepFailure {
    reason: FailureReason,
    message: String,
}

/// State machine for one SSH host
struct Protocol<'a> {
    host: &'a str,
    spec: &'a OperationSpec,
    credentials: &'a Credentials,
    ctx: &'a ExecContext,
    session: Box<dyn RemoteSession>,
    state: ProtocolState,
}

impl<'a> Protocol<'a> {
    fn new(
        host: &'a str,
        spec: &'a OperationSpec,
        credentials: &'a Credentials,
        ctx: &'a ExecContext,
        session: Box<dyn RemoteSession>,
    ) -> Self {
        Self {
            host,
            spec,
            credentials,
            ctx,
            session,
            state: ProtocolState::Init,
        }
    }

    async fn run(mut self) -> HostOutcome {
        let result = self.steps().await;

        // A failed connect leaves nothing to tear down
        if self.state != ProtocolState::Init
            && timeout(self.ctx.command_timeout, self.session.close())
                .await
                .is_err()
        {
            tracing::debug!(host = %self.host, "Session close timed out");
        }
        self.state = ProtocolState::Done;

        match result {
            Ok(message) => {
                tracing::debug!(host = %self.host, "{}", message);
                HostOutcome::success(self.host, message)
            }
            Err(failure) => HostOutcome::failure(self.host, failure.reason, failure.message),
        }
    }

    async fn steps(&mut self) -> Result<String, StepFailure> {
        self.connect().await?;
        self.enter(ProtocolState::Connected);
        self.verify().await?;
        self.enter(ProtocolState::Verified);
        self.act().await
    }

    fn enter(&mut self, state: ProtocolState) {
        tracing::debug!(host = %self.host, ?state, "Protocol step");
        self.state = state;
    }

    fn fail(&self, message: impl Into<String>) -> StepFailure {
        StepFailure {
            reason: self.state.failure_reason(),
            message: message.into(),
        }
    }

    async fn connect(&mut self) -> Result<(), StepFailure> {
        let deadline = self.ctx.connect_timeout;
        let result = timeout(
            deadline,
            self.session
                .connect(self.host, self.spec.port, self.credentials, deadline),
        )
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.fail(e.to_string())),
            Err(_) => Err(self.fail(SessionError::Timeout(deadline).to_string())),
        }
    }

    /// Run a command under the command deadline
    async fn call(&mut self, command: &str) -> Result<String, SessionError> {
        let deadline = self.ctx.command_timeout;
        timeout(deadline, self.session.run(command))
            .await
            .unwrap_or(Err(SessionError::Timeout(deadline)))
    }

    async fn upload(&mut self, bytes: &[u8], path: &str) -> Result<(), SessionError> {
        let deadline = self.ctx.command_timeout;
        timeout(deadline, self.session.upload(bytes, path))
            .await
            .unwrap_or(Err(SessionError::Timeout(deadline)))
    }

    async fn require_tool(&mut self, program: &str) -> Result<(), StepFailure> {
        self.call(&commands::check_executable(program))
            .await
            .map(|_| ())
            .map_err(|e| self.fail(format!("{program} is not available: {e}")))
    }

    async fn require_writable(&mut self, dir: &str) -> Result<(), StepFailure> {
        self.call(&commands::ensure_writable_dir(dir))
            .await
            .map(|_| ())
            .map_err(|e| self.fail(format!("{dir} is not writable: {e}")))
    }

    async fn verify(&mut self) -> Result<(), StepFailure> {
        let spec = self.spec;
        let staging = normalize_directory(&self.ctx.staging_dir);

        match &spec.operation {
            Operation::Install { source } => match source {
                PackageSource::Repository { package, version } => {
                    self.require_tool("apt-get").await?;
                    let policy = self
                        .call(&commands::package_policy(package))
                        .await
                        .map_err(|e| self.fail(format!("apt-cache policy failed: {e}")))?;
                    if !commands::policy_lists_package(&policy, version.as_deref()) {
                        let wanted = match version {
                            Some(v) => format!("{package}={v}"),
                            None => package.clone(),
                        };
                        return Err(self.fail(format!(
                            "package {wanted} is not available from the configured repositories"
                        )));
                    }
                    Ok(())
                }
                PackageSource::Provided { .. } => {
                    self.require_tool("dpkg").await?;
                    self.require_writable(&staging).await
                }
                PackageSource::Download { .. } => {
                    self.require_tool("dpkg").await?;
                    self.require_tool("wget").await?;
                    self.require_writable(&staging).await
                }
            },
            Operation::Distribute { destination, .. } => {
                self.require_writable(&normalize_directory(destination))
                    .await
            }
            Operation::Scan { .. } => Err(self.fail("scans do not open SSH sessions")),
        }
    }

    /// Run a command as root under the command deadline
    ///
    /// A sudo password is written to stdin and never joins the command line.
    async fn call_privileged(&mut self, command: &str) -> Result<String, SessionError> {
        let wrapped = commands::privileged(
            command,
            self.credentials.username(),
            self.credentials.sudo_password(),
        );
        let deadline = self.ctx.command_timeout;
        let result = match &wrapped.input {
            Some(input) => {
                timeout(
                    deadline,
                    self.session
                        .run_with_input(&wrapped.command, input.as_bytes()),
                )
                .await
            }
            None => timeout(deadline, self.session.run(&wrapped.command)).await,
        };
        result.unwrap_or(Err(SessionError::Timeout(deadline)))
    }

    async fn act(&mut self) -> Result<String, StepFailure> {
        self.enter(ProtocolState::Acting);
        let spec = self.spec;

        match &spec.operation {
            Operation::Install { source } => match source {
                PackageSource::Repository { package, version } => {
                    let command = commands::install_from_repository(package, version.as_deref());
                    self.call_privileged(&command)
                        .await
                        .map_err(|e| self.fail(format!("apt-get install failed: {e}")))?;
                    Ok(match version {
                        Some(v) => format!("installed {package}={v}"),
                        None => format!("installed {package}"),
                    })
                }
                PackageSource::Provided { file_name, bytes } => {
                    let path = staging_path(&self.ctx.staging_dir, file_name);
                    self.upload(bytes, &path)
                        .await
                        .map_err(|e| self.fail(format!("upload to {path} failed: {e}")))?;
                    let installed = self.install_staged(&path).await;
                    self.remove_staged(&path).await;
                    installed?;
                    Ok(format!("installed {file_name}"))
                }
                PackageSource::Download { url } => {
                    let path = staging_path(&self.ctx.staging_dir, &deb_name(url));
                    let installed = match self.call(&commands::download(url, &path)).await {
                        Ok(_) => self.install_staged(&path).await,
                        Err(e) => Err(self.fail(format!("download of {url} failed: {e}"))),
                    };
                    self.remove_staged(&path).await;
                    installed?;
                    Ok(format!("installed {url}"))
                }
            },
            Operation::Distribute {
                file_name,
                bytes,
                destination,
            } => {
                let path = format!("{}{}", normalize_directory(destination), file_name);
                self.upload(bytes, &path)
                    .await
                    .map_err(|e| self.fail(format!("upload to {path} failed: {e}")))?;
                Ok(format!("copied {} bytes to {path}", bytes.len()))
            }
            Operation::Scan { .. } => Err(self.fail("scans do not open SSH sessions")),
        }
    }

    async fn install_staged(&mut self, path: &str) -> Result<(), StepFailure> {
        self.call_privileged(&commands::install_deb(path))
            .await
            .map(|_| ())
            .map_err(|e| self.fail(format!("dpkg -i failed: {e}")))
    }

    async fn remove_staged(&mut self, path: &str) {
        if let Err(e) = self.call(&commands::remove_file(path)).await {
            tracing::debug!(host = %self.host, "Failed to remove staged file {}: {}", path, e);
        }
    }
}

/// Unique path for a staged upload
fn staging_path(staging_dir: &str, file_name: &str) -> String {
    format!(
        "{}netinv-{:08x}-{}",
        normalize_directory(staging_dir),
        rand::random::<u32>(),
        file_name
    )
}

/// Package file name for a download URL
fn deb_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty() && !n.contains(':'))
        .unwrap_or("package");
    if name.ends_with(".deb") {
        name.to_string()
    } else {
        format!("{name}.deb")
    }
}

#[derive(Clone, Copy)]
struct ScanRequest<'a> {
    ports: Option<&'a str>,
    timing: Option<&'a str>,
    sudo: Option<&'a Credentials>,
}

/// Scan one sub-range and record a fact for every host in it
async fn run_scan(
    hosts: &[String],
    request: ScanRequest<'_>,
    ctx: &ExecContext,
    scanner: &dyn PortScanner,
    results: &ResultAggregator,
) {
    let range_expr = to_range_expr(hosts);
    tracing::debug!(range = %range_expr, hosts = hosts.len(), "Scanning sub-range");

    let deadline = ctx.scan_timeout;
    let scanned = match timeout(
        deadline,
        scanner.scan(&range_expr, request.ports, request.sudo, request.timing),
    )
    .await
    {
        Ok(Ok(facts)) => Ok(facts),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("scan timed out after {deadline:?}")),
    };

    match scanned {
        Ok(mut facts) => {
            for host in hosts {
                let found = facts
                    .iter()
                    .position(|f| f.host == *host || f.hostnames.contains(host));
                let fact = match found {
                    Some(index) => {
                        let mut fact = facts.swap_remove(index);
                        fact.host = host.clone();
                        fact
                    }
                    None => ScanFact::unreachable(host.as_str()),
                };
                results.record_scan(fact);
            }
            if !facts.is_empty() {
                tracing::debug!(extra = facts.len(), "Scanner reported hosts outside the sub-range");
            }
        }
        Err(message) => {
            for host in hosts {
                results.record(HostOutcome::failure(
                    host.as_str(),
                    FailureReason::CommandExecutionError,
                    message.clone(),
                ));
                results.record_scan(ScanFact::unreachable(host.as_str()));
            }
        }
    }
}
