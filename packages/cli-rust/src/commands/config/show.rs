//! Config show subcommand
//!
//! Displays current configuration in table or JSON format.

use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use netinv_core::{Config, config};

/// Show current configuration
///
/// The config holds no secrets, so JSON output is the file as loaded.
pub fn cmd_config_show(config: &Config, json: bool, _quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);

    table.add_row(vec![
        Cell::new("version"),
        Cell::new(config.version.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("worker_count"),
        Cell::new(config.worker_count.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("ssh_port"),
        Cell::new(config.ssh_port.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("connect_timeout_secs"),
        Cell::new(format_secs(config.connect_timeout_secs)),
    ]);
    table.add_row(vec![
        Cell::new("command_timeout_secs"),
        Cell::new(format_secs(config.command_timeout_secs)),
    ]);
    table.add_row(vec![
        Cell::new("scan_timeout_secs"),
        Cell::new(format_secs(config.scan_timeout_secs)),
    ]);
    table.add_row(vec![
        Cell::new("batch_deadline_secs"),
        match config.batch_deadline_secs {
            Some(secs) => Cell::new(format_secs(secs)).fg(Color::Yellow),
            None => Cell::new("(none)"),
        },
    ]);
    table.add_row(vec![Cell::new("staging_dir"), Cell::new(&config.staging_dir)]);
    table.add_row(vec![Cell::new("nmap_path"), Cell::new(&config.nmap_path)]);
    table.add_row(vec![Cell::new("ssh_path"), Cell::new(&config.ssh_path)]);
    table.add_row(vec![
        Cell::new("sshpass_path"),
        Cell::new(&config.sshpass_path),
    ]);
    table.add_row(vec![
        Cell::new("default_user"),
        Cell::new(format_user(config)),
    ]);
    table.add_row(vec![
        Cell::new("save_results"),
        Cell::new(config.save_results.to_string()),
    ]);

    println!("{table}");

    if let Some(path) = config::paths::get_config_path() {
        println!();
        println!("Config file: {}", path.display());
    }
    if let Some(path) = config::paths::get_results_dir() {
        println!("Results dir: {}", path.display());
    }

    Ok(())
}

/// Seconds with a human-readable duration alongside
fn format_secs(secs: u64) -> String {
    format!(
        "{secs} ({})",
        humantime::format_duration(std::time::Duration::from_secs(secs))
    )
}

fn format_user(config: &Config) -> String {
    match &config.default_user {
        Some(user) if !user.is_empty() => user.clone(),
        _ => format!("(local user: {})", config.login_user()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs_adds_human_form() {
        assert_eq!(format_secs(600), "600 (10m)");
        assert_eq!(format_secs(0), "0 (0s)");
    }

    #[test]
    fn test_format_user_configured() {
        let config = Config {
            default_user: Some("deploy".to_string()),
            ..Config::default()
        };
        assert_eq!(format_user(&config), "deploy");
    }

    #[test]
    fn test_format_user_falls_back_to_local() {
        let config = Config {
            default_user: Some(String::new()),
            ..Config::default()
        };
        assert!(format_user(&config).starts_with("(local user: "));
    }
}
