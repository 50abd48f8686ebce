//! Distribute command implementation
//!
//! Copies one local file into a directory on every target host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Args;
use netinv_core::{Config, params};

use super::batch::{LoginArgs, Params, TargetArgs, base_params, run_batch};

/// Arguments for the distribute command
#[derive(Args, Debug)]
pub struct DistributeArgs {
    /// Local file to copy
    pub file: PathBuf,

    /// Destination directory on the hosts
    #[arg(long, short = 'd')]
    pub dest: String,

    /// File name on the hosts (default: the local file name)
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub login: LoginArgs,
}

/// Copy a file to every target host
pub async fn cmd_distribute(args: DistributeArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut map = base_params("distribute");
    args.targets.apply(&mut map)?;
    file_params(&args, &mut map).await?;
    args.login.apply(config, &mut map)?;

    run_batch(&map, &args.targets, config, quiet).await?;
    Ok(())
}

async fn file_params(args: &DistributeArgs, map: &mut Params) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", args.file.display()))?,
    };

    map.insert(params::FILE_NAME.to_string(), name);
    map.insert(params::FILE.to_string(), BASE64.encode(bytes));
    map.insert(params::DEST_DIRECTORY.to_string(), args.dest.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(file: PathBuf, name: Option<&str>) -> DistributeArgs {
        DistributeArgs {
            file,
            dest: "/etc/agent".to_string(),
            name: name.map(str::to_string),
            targets: TargetArgs::default(),
            login: LoginArgs::default(),
        }
    }

    #[tokio::test]
    async fn empty_file_keeps_local_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.conf");
        std::fs::write(&path, b"").unwrap();

        let mut map = Params::new();
        file_params(&args(path, None), &mut map).await.unwrap();
        assert_eq!(map.get(params::FILE_NAME).unwrap(), "empty.conf");
        assert_eq!(map.get(params::FILE).unwrap(), "");
        assert_eq!(map.get(params::DEST_DIRECTORY).unwrap(), "/etc/agent");
    }

    #[tokio::test]
    async fn name_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.conf");
        std::fs::write(&path, b"x=1").unwrap();

        let mut map = Params::new();
        file_params(&args(path, Some("agent.conf")), &mut map)
            .await
            .unwrap();
        assert_eq!(map.get(params::FILE_NAME).unwrap(), "agent.conf");
        assert_eq!(map.get(params::FILE).unwrap(), "eD0x");
    }
}
