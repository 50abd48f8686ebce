//! Config set subcommand
//!
//! Sets a single configuration value.

use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use netinv_core::{Config, load_config, save_config};

/// Set a configuration value
///
/// Timeouts and the deadline accept plain seconds or durations like "5m".
pub fn cmd_config_set(key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = load_config()?;
    let display_value = apply(&mut config, key, value)?;
    save_config(&config)?;

    if !quiet {
        println!(
            "{} Set {} = {}",
            style("Success:").green().bold(),
            key,
            display_value
        );
    }

    Ok(())
}

/// Update `config` in place, returning the value as it will be shown
fn apply(config: &mut Config, key: &str, value: &str) -> Result<String> {
    let value = value.trim();

    match key.to_lowercase().as_str() {
        "workers" | "worker_count" => {
            let workers: usize = value.parse().map_err(|_| {
                anyhow::anyhow!("Invalid worker_count: {value}. Must be a positive integer.")
            })?;
            if workers == 0 {
                bail!("worker_count must be at least 1");
            }
            config.worker_count = workers;
            Ok(workers.to_string())
        }

        "port" | "ssh_port" => {
            let port: u16 = value
                .parse()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| {
                    anyhow::anyhow!("Invalid port number: {value}. Must be a number between 1-65535.")
                })?;
            config.ssh_port = port;
            Ok(port.to_string())
        }

        "connect_timeout" | "connect_timeout_secs" => {
            config.connect_timeout_secs = parse_secs(value, key)?;
            Ok(config.connect_timeout_secs.to_string())
        }

        "command_timeout" | "command_timeout_secs" => {
            config.command_timeout_secs = parse_secs(value, key)?;
            Ok(config.command_timeout_secs.to_string())
        }

        "scan_timeout" | "scan_timeout_secs" => {
            config.scan_timeout_secs = parse_secs(value, key)?;
            Ok(config.scan_timeout_secs.to_string())
        }

        "deadline" | "batch_deadline_secs" => {
            if is_unset(value) {
                config.batch_deadline_secs = None;
                Ok("(none)".to_string())
            } else {
                let secs = parse_secs(value, key)?;
                config.batch_deadline_secs = Some(secs);
                Ok(secs.to_string())
            }
        }

        "staging_dir" => {
            if !value.starts_with('/') {
                bail!("staging_dir must be an absolute path, got '{value}'");
            }
            config.staging_dir = value.to_string();
            Ok(value.to_string())
        }

        "nmap" | "nmap_path" => set_path(&mut config.nmap_path, value, key),
        "ssh" | "ssh_path" => set_path(&mut config.ssh_path, value, key),
        "sshpass" | "sshpass_path" => set_path(&mut config.sshpass_path, value, key),

        "user" | "default_user" => {
            if is_unset(value) {
                config.default_user = None;
                Ok("(local user)".to_string())
            } else {
                config.default_user = Some(value.to_string());
                Ok(value.to_string())
            }
        }

        "save_results" => {
            let parsed = parse_bool(value).ok_or_else(|| {
                anyhow::anyhow!("Invalid boolean value: {value}. Use: true/false, yes/no, or 1/0")
            })?;
            config.save_results = parsed;
            Ok(parsed.to_string())
        }

        _ => {
            bail!(
                "Unknown configuration key: {key}\n\n\
                Valid keys:\n  \
                  workers / worker_count\n  \
                  port / ssh_port\n  \
                  connect_timeout / connect_timeout_secs\n  \
                  command_timeout / command_timeout_secs\n  \
                  scan_timeout / scan_timeout_secs\n  \
                  deadline / batch_deadline_secs  (\"none\" to clear)\n  \
                  staging_dir\n  \
                  nmap / nmap_path\n  \
                  ssh / ssh_path\n  \
                  sshpass / sshpass_path\n  \
                  user / default_user  (\"none\" to clear)\n  \
                  save_results"
            );
        }
    }
}

fn set_path(field: &mut String, value: &str, key: &str) -> Result<String> {
    if value.is_empty() {
        bail!("{key} cannot be empty");
    }
    *field = value.to_string();
    Ok(value.to_string())
}

/// Whole seconds from "90" or a humantime duration such as "1m30s"
fn parse_secs(value: &str, key: &str) -> Result<u64> {
    let duration = match value.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(value).map_err(|e| {
            anyhow::anyhow!("Invalid duration for {key}: {value} ({e}). Use seconds or e.g. \"5m\".")
        })?,
    };
    if duration.is_zero() {
        bail!("{key} must be greater than zero");
    }
    Ok(duration.as_secs().max(1))
}

fn is_unset(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "" | "none" | "off" | "unset")
}

/// Parse boolean from various string representations
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs_accepts_plain_and_human() {
        assert_eq!(parse_secs("90", "scan_timeout").unwrap(), 90);
        assert_eq!(parse_secs("5m", "scan_timeout").unwrap(), 300);
        assert_eq!(parse_secs("1h 30m", "scan_timeout").unwrap(), 5400);
    }

    #[test]
    fn test_parse_secs_rejects_zero_and_garbage() {
        assert!(parse_secs("0", "deadline").is_err());
        assert!(parse_secs("soon", "deadline").is_err());
    }

    #[test]
    fn test_workers_must_be_positive() {
        let mut config = Config::default();
        assert!(apply(&mut config, "workers", "0").is_err());
        assert_eq!(apply(&mut config, "workers", "12").unwrap(), "12");
        assert_eq!(config.worker_count, 12);
    }

    #[test]
    fn test_deadline_set_and_clear() {
        let mut config = Config::default();
        apply(&mut config, "deadline", "10m").unwrap();
        assert_eq!(config.batch_deadline_secs, Some(600));
        apply(&mut config, "deadline", "none").unwrap();
        assert_eq!(config.batch_deadline_secs, None);
    }

    #[test]
    fn test_staging_dir_must_be_absolute() {
        let mut config = Config::default();
        assert!(apply(&mut config, "staging_dir", "tmp").is_err());
        apply(&mut config, "staging_dir", "/var/tmp/").unwrap();
        assert_eq!(config.staging_dir, "/var/tmp/");
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = Config::default();
        assert!(apply(&mut config, "port", "0").is_err());
        assert!(apply(&mut config, "port", "70000").is_err());
        apply(&mut config, "ssh_port", "2222").unwrap();
        assert_eq!(config.ssh_port, 2222);
    }

    #[test]
    fn test_unknown_key() {
        let mut config = Config::default();
        assert!(apply(&mut config, "boot_mode", "user").is_err());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
