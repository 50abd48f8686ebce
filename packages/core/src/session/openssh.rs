//! OpenSSH-backed sessions
//!
//! A session owns one multiplexing master (`ssh -M -N`) per host. Commands and
//! transfers ride on the master's control socket, so a host is authenticated
//! exactly once per operation. Password and passphrase logins go through
//! `sshpass`; key logins without a passphrase use `BatchMode` and fail fast.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use super::error::SessionError;
use super::{RemoteSession, SessionFactory};
use crate::operation::Credentials;
use crate::operation::commands::shell_quote;

/// sshpass exit code for a rejected password
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// Paths and tunables for the system SSH tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshClientOptions {
    pub ssh_path: String,
    pub sshpass_path: String,
}

impl Default for SshClientOptions {
    fn default() -> Self {
        Self {
            ssh_path: "ssh".to_string(),
            sshpass_path: "sshpass".to_string(),
        }
    }
}

/// Hands out [`OpenSshSession`]s sharing one set of client options
#[derive(Debug, Clone, Default)]
pub struct OpenSshFactory {
    options: SshClientOptions,
}

impl OpenSshFactory {
    pub fn new(options: SshClientOptions) -> Self {
        Self { options }
    }
}

impl SessionFactory for OpenSshFactory {
    fn create(&self) -> Box<dyn RemoteSession> {
        Box::new(OpenSshSession::new(self.options.clone()))
    }
}

enum Secret {
    Password(String),
    Passphrase(String),
}

/// Connection parameters for one host
struct Target {
    host: String,
    port: u16,
    user: String,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
}

impl Target {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options shared by the master and every multiplexed client
    fn common_args(&self, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            format!("ControlPath={}", control_path.display()),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }
}

struct Connection {
    target: Target,
    master: Child,
    control_dir: TempDir,
}

impl Connection {
    fn control_path(&self) -> PathBuf {
        control_path(&self.control_dir)
    }
}

fn control_path(dir: &TempDir) -> PathBuf {
    dir.path().join("master.sock")
}

/// SSH session driven through the system `ssh` binary
pub struct OpenSshSession {
    options: SshClientOptions,
    connection: Option<Connection>,
}

impl OpenSshSession {
    pub fn new(options: SshClientOptions) -> Self {
        Self {
            options,
            connection: None,
        }
    }

    /// Build the master command: `[sshpass -e [-P passphrase]] ssh -M -N ... user@host`
    fn master_command(&self, target: &Target, secret: Option<&Secret>, control_path: &Path) -> Command {
        let mut cmd = match secret {
            Some(secret) => {
                let mut cmd = Command::new(&self.options.sshpass_path);
                cmd.arg("-e");
                let value = match secret {
                    Secret::Password(password) => password,
                    Secret::Passphrase(passphrase) => {
                        cmd.arg("-P").arg("passphrase");
                        passphrase
                    }
                };
                cmd.env("SSHPASS", value);
                cmd.arg(&self.options.ssh_path);
                cmd.arg("-o").arg("NumberOfPasswordPrompts=1");
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.options.ssh_path);
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };

        cmd.arg("-M").arg("-N");
        cmd.arg("-o").arg("ControlPersist=no");
        cmd.args(target.common_args(control_path));
        cmd.arg(target.destination());

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Build a client command that reuses the master's socket
    fn client_command(&self, connection: &Connection) -> Command {
        let mut cmd = Command::new(&self.options.ssh_path);
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-o").arg("ControlMaster=no");
        cmd.args(connection.target.common_args(&connection.control_path()));
        cmd.arg(connection.target.destination());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Ask the master whether it is up and authenticated
    async fn master_ready(&self, target: &Target, control_path: &Path) -> bool {
        let status = Command::new(&self.options.ssh_path)
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-O")
            .arg("check")
            .arg(target.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        matches!(status, Ok(s) if s.success())
    }

    fn connection(&self) -> Result<&Connection, SessionError> {
        self.connection.as_ref().ok_or(SessionError::NotConnected)
    }

    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<Vec<u8>, SessionError> {
        let connection = self.connection()?;
        let mut cmd = self.client_command(connection);
        cmd.arg(command);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(spawn_error)?;

        if let Some(bytes) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .ok_or_else(|| SessionError::Transfer("stdin unavailable".to_string()))?;
            pipe.write_all(bytes)
                .await
                .map_err(|e| SessionError::Transfer(e.to_string()))?;
            pipe.shutdown()
                .await
                .map_err(|e| SessionError::Transfer(e.to_string()))?;
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // 255 is ssh's own failure code: the transport, not the command, broke
            if output.status.code() == Some(255) {
                Err(SessionError::ConnectionFailed(stderr))
            } else {
                Err(SessionError::CommandFailed {
                    status: output.status.code(),
                    stderr,
                })
            }
        }
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn connect(
        &mut self,
        addr: &str,
        port: u16,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        self.close().await;

        let (identity_file, secret) = match credentials {
            Credentials::Password { password, .. } => (None, Some(Secret::Password(password.clone()))),
            Credentials::PrivateKey {
                key_path,
                passphrase,
                ..
            } => (
                Some(key_path.clone()),
                passphrase.clone().map(Secret::Passphrase),
            ),
        };

        let target = Target {
            host: addr.to_string(),
            port,
            user: credentials.username().to_string(),
            identity_file,
            connect_timeout: timeout,
        };

        let control_dir = tempfile::Builder::new()
            .prefix("netinv-ssh-")
            .tempdir()
            .map_err(|e| SessionError::Spawn(format!("control directory: {e}")))?;
        let socket = control_path(&control_dir);

        tracing::debug!(host = %addr, port, user = %target.user, "Starting SSH master");

        let mut master = self
            .master_command(&target, secret.as_ref(), &socket)
            .spawn()
            .map_err(spawn_error)?;

        let deadline = Instant::now() + timeout;
        let mut delay = Duration::from_millis(50);

        loop {
            if let Some(status) = master.try_wait().map_err(spawn_error)? {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(classify_master_exit(status.code(), stderr.trim(), &target));
            }

            if self.master_ready(&target, &socket).await {
                tracing::debug!(host = %addr, "SSH master ready");
                break;
            }

            if Instant::now() >= deadline {
                let _ = master.kill().await;
                return Err(SessionError::Timeout(timeout));
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(500));
        }

        self.connection = Some(Connection {
            target,
            master,
            control_dir,
        });
        Ok(())
    }

    async fn run(&mut self, command: &str) -> Result<String, SessionError> {
        let stdout = self.exec(command, None).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    async fn run_with_input(
        &mut self,
        command: &str,
        input: &[u8],
    ) -> Result<String, SessionError> {
        let stdout = self.exec(command, Some(input)).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    async fn upload(&mut self, bytes: &[u8], remote_path: &str) -> Result<(), SessionError> {
        let command = format!("cat > {}", shell_quote(remote_path));
        self.exec(&command, Some(bytes)).await.map(|_| ())
    }

    async fn download(&mut self, remote_path: &str) -> Result<Vec<u8>, SessionError> {
        self.exec(&format!("cat {}", shell_quote(remote_path)), None)
            .await
    }

    async fn close(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        tracing::debug!(host = %connection.target.host, "Closing SSH master");

        let _ = Command::new(&self.options.ssh_path)
            .arg("-o")
            .arg(format!("ControlPath={}", connection.control_path().display()))
            .arg("-O")
            .arg("exit")
            .arg(connection.target.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        if let Err(e) = connection.master.kill().await {
            // Master may have already exited after -O exit
            tracing::trace!("SSH master kill result: {}", e);
        }
    }
}

fn spawn_error(e: std::io::Error) -> SessionError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SessionError::Spawn("SSH client not found. Install OpenSSH client (and sshpass for password logins).".to_string())
    } else {
        SessionError::Spawn(e.to_string())
    }
}

fn classify_master_exit(code: Option<i32>, stderr: &str, target: &Target) -> SessionError {
    if code == Some(SSHPASS_BAD_PASSWORD)
        || stderr.contains("Permission denied")
        || stderr.contains("Too many authentication failures")
    {
        SessionError::AuthFailed {
            user: target.user.clone(),
            host: target.host.clone(),
        }
    } else if stderr.is_empty() {
        SessionError::ConnectionFailed(format!(
            "ssh exited with status {}",
            code.map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string())
        ))
    } else {
        SessionError::ConnectionFailed(stderr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(identity: Option<&str>) -> Target {
        Target {
            host: "10.0.0.7".to_string(),
            port: 2222,
            user: "admin".to_string(),
            identity_file: identity.map(PathBuf::from),
            connect_timeout: Duration::from_secs(15),
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn common_args_include_port_key_and_socket() {
        let args = target(Some("/keys/id_ed25519")).common_args(Path::new("/tmp/x/master.sock"));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_ed25519"]));
        assert!(args.contains(&"ControlPath=/tmp/x/master.sock".to_string()));
        assert!(args.contains(&"ConnectTimeout=15".to_string()));
    }

    #[test]
    fn key_login_uses_batch_mode() {
        let session = OpenSshSession::new(SshClientOptions::default());
        let cmd = session.master_command(&target(Some("/k")), None, Path::new("/tmp/s"));
        assert_eq!(cmd.as_std().get_program(), "ssh");
        let args = args_of(&cmd);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"-M".to_string()));
        assert_eq!(args.last().unwrap(), "admin@10.0.0.7");
    }

    #[test]
    fn password_login_goes_through_sshpass_env() {
        let session = OpenSshSession::new(SshClientOptions::default());
        let secret = Secret::Password("hunter2".to_string());
        let cmd = session.master_command(&target(None), Some(&secret), Path::new("/tmp/s"));
        assert_eq!(cmd.as_std().get_program(), "sshpass");
        let args = args_of(&cmd);
        assert_eq!(args[0], "-e");
        // Secret travels in the environment, never on the command line
        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert!(!args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn passphrase_login_sets_prompt() {
        let session = OpenSshSession::new(SshClientOptions::default());
        let secret = Secret::Passphrase("pp".to_string());
        let cmd = session.master_command(&target(Some("/k")), Some(&secret), Path::new("/tmp/s"));
        let args = args_of(&cmd);
        assert!(args.windows(2).any(|w| w == ["-P", "passphrase"]));
    }

    #[test]
    fn master_exit_classification() {
        let t = target(None);
        assert!(matches!(
            classify_master_exit(Some(255), "admin@10.0.0.7: Permission denied (publickey).", &t),
            SessionError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_master_exit(Some(SSHPASS_BAD_PASSWORD), "", &t),
            SessionError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_master_exit(Some(255), "ssh: connect to host 10.0.0.7 port 2222: No route to host", &t),
            SessionError::ConnectionFailed(_)
        ));
    }

    #[tokio::test]
    async fn calls_before_connect_fail() {
        let mut session = OpenSshSession::new(SshClientOptions::default());
        assert_eq!(session.run("true").await, Err(SessionError::NotConnected));
        assert_eq!(
            session.run_with_input("cat", b"x\n").await,
            Err(SessionError::NotConnected)
        );
        assert_eq!(
            session.upload(b"x", "/tmp/x").await,
            Err(SessionError::NotConnected)
        );
        // Closing an unconnected session is a no-op
        session.close().await;
    }
}
