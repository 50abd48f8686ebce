//! Scan command implementation
//!
//! Runs nmap over the target range, split into one sub-range per worker.

use anyhow::Result;
use clap::Args;
use dialoguer::Password;
use netinv_core::{Config, params};

use super::batch::{Params, TargetArgs, base_params, run_batch};

/// Environment variable consulted before prompting for the sudo password
pub const SUDO_PASSWORD_ENV: &str = "NETINV_SUDO_PASSWORD";

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Ports to scan, in nmap syntax (e.g. "22,80,8000-8100")
    #[arg(long)]
    pub ports: Option<String>,

    /// nmap timing template, 0 (paranoid) to 5 (insane)
    #[arg(long, short = 'T', value_parser = clap::value_parser!(u8).range(0..=5))]
    pub timing: Option<u8>,

    /// Run nmap through sudo as this user, enabling OS detection
    #[arg(long)]
    pub sudo_user: Option<String>,
}

/// Scan every target host
pub async fn cmd_scan(args: ScanArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut map = base_params("scan");
    args.targets.apply(&mut map)?;
    scan_params(&args, &mut map);

    if let Some(user) = &args.sudo_user {
        let password = match std::env::var(SUDO_PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => password,
            _ => Password::new()
                .with_prompt(format!("sudo password for {user}"))
                .interact()?,
        };
        map.insert(params::SUDO_USERNAME.to_string(), user.clone());
        map.insert(params::SUDO_PASSWORD.to_string(), password);
    }

    run_batch(&map, &args.targets, config, quiet).await?;
    Ok(())
}

fn scan_params(args: &ScanArgs, map: &mut Params) {
    if let Some(ports) = &args.ports {
        map.insert(params::PORTS.to_string(), ports.clone());
    }
    if let Some(timing) = args.timing {
        map.insert(params::TIMING_TEMPLATE.to_string(), timing.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netinv_core::from_parameter_map;

    #[test]
    fn scan_map_is_accepted_without_login() {
        let args = ScanArgs {
            targets: TargetArgs {
                range: Some("10.0.0.0/30".to_string()),
                ..Default::default()
            },
            ports: Some("22,80".to_string()),
            timing: Some(4),
            sudo_user: None,
        };
        let mut map = base_params("scan");
        args.targets.apply(&mut map).unwrap();
        scan_params(&args, &mut map);

        let (spec, targets) = from_parameter_map(&map).unwrap();
        assert_eq!(targets.len(), 4);
        assert!(spec.credentials.is_none());
        assert_eq!(map.get(params::TIMING_TEMPLATE).unwrap(), "4");
    }
}
