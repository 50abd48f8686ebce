//! Config get subcommand
//!
//! Retrieves a single configuration value by key.

use anyhow::{Result, bail};
use netinv_core::Config;

/// Get a single configuration value
///
/// Outputs just the value (no formatting) for scripting.
pub fn cmd_config_get(config: &Config, key: &str, _quiet: bool) -> Result<()> {
    println!("{}", lookup(config, key)?);
    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String> {
    // Normalize key (support both short and full forms)
    let value = match key.to_lowercase().as_str() {
        "version" => config.version.to_string(),
        "workers" | "worker_count" => config.worker_count.to_string(),
        "port" | "ssh_port" => config.ssh_port.to_string(),
        "connect_timeout" | "connect_timeout_secs" => config.connect_timeout_secs.to_string(),
        "command_timeout" | "command_timeout_secs" => config.command_timeout_secs.to_string(),
        "scan_timeout" | "scan_timeout_secs" => config.scan_timeout_secs.to_string(),
        "deadline" | "batch_deadline_secs" => config
            .batch_deadline_secs
            .map(|s| s.to_string())
            .unwrap_or_default(),
        "staging_dir" => config.staging_dir.clone(),
        "nmap" | "nmap_path" => config.nmap_path.clone(),
        "ssh" | "ssh_path" => config.ssh_path.clone(),
        "sshpass" | "sshpass_path" => config.sshpass_path.clone(),
        "user" | "default_user" => config.default_user.clone().unwrap_or_default(),
        "save_results" => config.save_results.to_string(),
        _ => {
            bail!(
                "Unknown configuration key: {key}\n\n\
                Valid keys:\n  \
                  version\n  \
                  workers / worker_count\n  \
                  port / ssh_port\n  \
                  connect_timeout / connect_timeout_secs\n  \
                  command_timeout / command_timeout_secs\n  \
                  scan_timeout / scan_timeout_secs\n  \
                  deadline / batch_deadline_secs\n  \
                  staging_dir\n  \
                  nmap / nmap_path\n  \
                  ssh / ssh_path\n  \
                  sshpass / sshpass_path\n  \
                  user / default_user\n  \
                  save_results"
            );
        }
    };
    Ok(value)
}
