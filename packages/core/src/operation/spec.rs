//! Operation descriptions
//!
//! An [`OperationSpec`] is built once before a batch and shared read-only by
//! every worker. Each operation kind carries only the fields it needs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How the orchestrator authenticates against target hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMethod {
    UsernamePassword,
    PrivateKey,
}

impl std::str::FromStr for AccessMethod {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USERNAME_PASSWORD" | "PASSWORD" => Ok(AccessMethod::UsernamePassword),
            "PRIVATE_KEY" | "KEY" => Ok(AccessMethod::PrivateKey),
            other => Err(InputError::InvalidCredentials(format!(
                "unknown access method '{other}'"
            ))),
        }
    }
}

/// Login credentials, exactly one access method per value
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password {
        username: String,
        password: String,
    },
    PrivateKey {
        username: String,
        key_path: PathBuf,
        passphrase: Option<String>,
    },
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn private_key(
        username: impl Into<String>,
        key_path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        Credentials::PrivateKey {
            username: username.into(),
            key_path: key_path.into(),
            passphrase,
        }
    }

    /// Build credentials from loose optional fields
    ///
    /// Exactly one of `password` / `private_key` must be present. Nothing is
    /// ever substituted for a missing secret.
    pub fn from_fields(
        username: Option<&str>,
        password: Option<&str>,
        private_key: Option<&str>,
        passphrase: Option<&str>,
    ) -> Result<Self, InputError> {
        let username = non_empty(username)
            .ok_or_else(|| InputError::MissingField("username".to_string()))?;

        let creds = match (non_empty(password), non_empty(private_key)) {
            (Some(_), Some(_)) => {
                return Err(InputError::InvalidCredentials(
                    "both a password and a private key were supplied; choose one access method"
                        .to_string(),
                ));
            }
            (None, None) => {
                return Err(InputError::InvalidCredentials(
                    "neither a password nor a private key was supplied".to_string(),
                ));
            }
            (Some(password), None) => Credentials::password(username, password),
            (None, Some(key)) => Credentials::private_key(
                username,
                key,
                non_empty(passphrase).map(str::to_string),
            ),
        };

        creds.validate()?;
        Ok(creds)
    }

    pub fn username(&self) -> &str {
        match self {
            Credentials::Password { username, .. } | Credentials::PrivateKey { username, .. } => {
                username
            }
        }
    }

    /// Password usable for `sudo`, if this is password access
    pub fn sudo_password(&self) -> Option<&str> {
        match self {
            Credentials::Password { password, .. } => Some(password),
            Credentials::PrivateKey { .. } => None,
        }
    }

    pub fn access_method(&self) -> AccessMethod {
        match self {
            Credentials::Password { .. } => AccessMethod::UsernamePassword,
            Credentials::PrivateKey { .. } => AccessMethod::PrivateKey,
        }
    }

    /// Reject blank usernames and secrets
    pub fn validate(&self) -> Result<(), InputError> {
        if self.username().trim().is_empty() {
            return Err(InputError::InvalidCredentials("username is empty".to_string()));
        }
        match self {
            Credentials::Password { password, .. } if password.is_empty() => Err(
                InputError::InvalidCredentials("password is empty".to_string()),
            ),
            Credentials::PrivateKey { key_path, .. } if key_path.as_os_str().is_empty() => Err(
                InputError::InvalidCredentials("private key path is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            Credentials::PrivateKey {
                username,
                key_path,
                passphrase,
            } => f
                .debug_struct("PrivateKey")
                .field("username", username)
                .field("key_path", key_path)
                .field("passphrase", &passphrase.as_ref().map(|_| "********"))
                .finish(),
        }
    }
}

/// Where an installed package comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// Install from the host's configured repositories
    Repository {
        package: String,
        version: Option<String>,
    },
    /// Upload a provided `.deb` and install it with dpkg
    Provided { file_name: String, bytes: Vec<u8> },
    /// Fetch a `.deb` on the host and install it with dpkg
    Download { url: String },
}

impl fmt::Debug for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageSource::Repository { package, version } => f
                .debug_struct("Repository")
                .field("package", package)
                .field("version", version)
                .finish(),
            PackageSource::Provided { file_name, bytes } => f
                .debug_struct("Provided")
                .field("file_name", file_name)
                .field("len", &bytes.len())
                .finish(),
            PackageSource::Download { url } => {
                f.debug_struct("Download").field("url", url).finish()
            }
        }
    }
}

/// The operation applied to every target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install {
        source: PackageSource,
    },
    Distribute {
        file_name: String,
        bytes: Vec<u8>,
        destination: String,
    },
    Scan {
        ports: Option<String>,
        timing: Option<String>,
        sudo: Option<Credentials>,
    },
}

/// Operation kind tag, used in summaries and stored results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Install,
    Distribute,
    Scan,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Install => write!(f, "install"),
            OperationKind::Distribute => write!(f, "distribute"),
            OperationKind::Scan => write!(f, "scan"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "install" => Ok(OperationKind::Install),
            "distribute" => Ok(OperationKind::Distribute),
            "scan" => Ok(OperationKind::Scan),
            other => Err(InputError::MissingField(format!(
                "operation (unknown kind '{other}')"
            ))),
        }
    }
}

/// Full description of one batch's work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation: Operation,
    /// Login credentials; required for install and distribute
    pub credentials: Option<Credentials>,
    pub port: u16,
}

impl OperationSpec {
    pub fn install(source: PackageSource, credentials: Credentials) -> Self {
        Self {
            operation: Operation::Install { source },
            credentials: Some(credentials),
            port: DEFAULT_SSH_PORT,
        }
    }

    pub fn distribute(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        destination: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            operation: Operation::Distribute {
                file_name: file_name.into(),
                bytes,
                destination: destination.into(),
            },
            credentials: Some(credentials),
            port: DEFAULT_SSH_PORT,
        }
    }

    pub fn scan(ports: Option<String>, timing: Option<String>, sudo: Option<Credentials>) -> Self {
        Self {
            operation: Operation::Scan { ports, timing, sudo },
            credentials: None,
            port: DEFAULT_SSH_PORT,
        }
    }

    /// Builder pattern: set SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn kind(&self) -> OperationKind {
        match self.operation {
            Operation::Install { .. } => OperationKind::Install,
            Operation::Distribute { .. } => OperationKind::Distribute,
            Operation::Scan { .. } => OperationKind::Scan,
        }
    }

    /// Check the operation is complete before any host is touched
    pub fn validate(&self) -> Result<(), InputError> {
        match &self.operation {
            Operation::Install { source } => {
                self.require_credentials()?;
                match source {
                    PackageSource::Repository { package, .. } => require("packageName", package),
                    PackageSource::Provided { file_name, .. } => require("debFileName", file_name),
                    PackageSource::Download { url } => require("downloadUrl", url),
                }
            }
            Operation::Distribute {
                file_name,
                destination,
                ..
            } => {
                self.require_credentials()?;
                require("filename", file_name)?;
                if file_name.contains('/') {
                    return Err(InputError::MissingField(format!(
                        "filename (must be a bare file name, got '{file_name}')"
                    )));
                }
                require("destDirectory", destination)
            }
            Operation::Scan { sudo, .. } => match sudo {
                Some(creds) => creds.validate(),
                None => Ok(()),
            },
        }
    }

    fn require_credentials(&self) -> Result<(), InputError> {
        match &self.credentials {
            Some(creds) => creds.validate(),
            None => Err(InputError::InvalidCredentials(format!(
                "{} requires SSH credentials",
                self.kind()
            ))),
        }
    }

    /// Secret-free description kept with the batch result
    pub fn summary(&self) -> OperationSummary {
        let detail = match &self.operation {
            Operation::Install { source } => match source {
                PackageSource::Repository { package, version } => match version {
                    Some(v) => format!("apt-get {package}={v}"),
                    None => format!("apt-get {package}"),
                },
                PackageSource::Provided { file_name, bytes } => {
                    format!("dpkg {file_name} ({} bytes)", bytes.len())
                }
                PackageSource::Download { url } => format!("wget {url}"),
            },
            Operation::Distribute {
                file_name,
                bytes,
                destination,
            } => format!(
                "{file_name} ({} bytes) -> {}",
                bytes.len(),
                normalize_directory(destination)
            ),
            Operation::Scan { ports, timing, .. } => format!(
                "ports={} timing={}",
                ports.as_deref().unwrap_or("default"),
                timing.as_deref().unwrap_or("default")
            ),
        };

        OperationSummary {
            kind: self.kind(),
            detail,
            access_method: self.credentials.as_ref().map(Credentials::access_method),
            username: self.credentials.as_ref().map(|c| c.username().to_string()),
            port: self.port,
        }
    }
}

/// What a batch did, without payloads or secrets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub detail: String,
    #[serde(default)]
    pub access_method: Option<AccessMethod>,
    #[serde(default)]
    pub username: Option<String>,
    pub port: u16,
}

/// Ensure a directory path ends with exactly one trailing separator
pub fn normalize_directory(dir: &str) -> String {
    let trimmed = dir.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn require(field: &str, value: &str) -> Result<(), InputError> {
    if value.trim().is_empty() {
        Err(InputError::MissingField(field.to_string()))
    } else {
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
