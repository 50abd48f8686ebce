//! Install command implementation
//!
//! Installs one package on every target host, from the hosts' apt
//! repositories, from a local .deb file, or from a URL the hosts download.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{ArgGroup, Args};
use netinv_core::{Config, params};

use super::batch::{LoginArgs, Params, TargetArgs, base_params, run_batch};

/// Arguments for the install command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["package", "deb", "url"])))]
pub struct InstallArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub login: LoginArgs,

    /// Package to install with apt-get
    #[arg(long)]
    pub package: Option<String>,

    /// Exact package version for --package
    #[arg(long, requires = "package")]
    pub pkg_version: Option<String>,

    /// Local .deb file to upload and install
    #[arg(long, value_name = "PATH")]
    pub deb: Option<PathBuf>,

    /// URL of a .deb file the hosts download themselves
    #[arg(long)]
    pub url: Option<String>,
}

/// Install a package on every target host
pub async fn cmd_install(args: InstallArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut map = base_params("install");
    args.targets.apply(&mut map)?;
    source_params(&args, &mut map).await?;
    args.login.apply(config, &mut map)?;

    run_batch(&map, &args.targets, config, quiet).await?;
    Ok(())
}

async fn source_params(args: &InstallArgs, map: &mut Params) -> Result<()> {
    if let Some(package) = &args.package {
        map.insert(params::INSTALL_METHOD.to_string(), "APT_GET".to_string());
        map.insert(params::PACKAGE_NAME.to_string(), package.clone());
        if let Some(version) = &args.pkg_version {
            map.insert(params::PACKAGE_VERSION.to_string(), version.clone());
        }
    } else if let Some(path) = &args.deb {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read package file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        map.insert(params::INSTALL_METHOD.to_string(), "PROVIDED_DEB".to_string());
        map.insert(params::DEB_FILE_NAME.to_string(), name);
        map.insert(params::DEB_FILE.to_string(), BASE64.encode(bytes));
    } else if let Some(url) = &args.url {
        map.insert(params::INSTALL_METHOD.to_string(), "WGET".to_string());
        map.insert(params::DOWNLOAD_URL.to_string(), url.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> InstallArgs {
        InstallArgs {
            targets: TargetArgs::default(),
            login: LoginArgs::default(),
            package: None,
            pkg_version: None,
            deb: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn repository_source() {
        let args = InstallArgs {
            package: Some("ahenk".to_string()),
            pkg_version: Some("1.2.0".to_string()),
            ..args()
        };
        let mut map = Params::new();
        source_params(&args, &mut map).await.unwrap();
        assert_eq!(map.get(params::INSTALL_METHOD).unwrap(), "APT_GET");
        assert_eq!(map.get(params::PACKAGE_VERSION).unwrap(), "1.2.0");
    }

    #[tokio::test]
    async fn deb_file_is_encoded_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_1.0_amd64.deb");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let args = InstallArgs {
            deb: Some(path),
            ..args()
        };
        let mut map = Params::new();
        source_params(&args, &mut map).await.unwrap();
        assert_eq!(map.get(params::INSTALL_METHOD).unwrap(), "PROVIDED_DEB");
        assert_eq!(map.get(params::DEB_FILE_NAME).unwrap(), "agent_1.0_amd64.deb");
        assert_eq!(map.get(params::DEB_FILE).unwrap(), "AQID");
    }

    #[tokio::test]
    async fn missing_deb_file_is_an_error() {
        let args = InstallArgs {
            deb: Some(PathBuf::from("/nonexistent/agent.deb")),
            ..args()
        };
        let mut map = Params::new();
        assert!(source_params(&args, &mut map).await.is_err());
    }
}
