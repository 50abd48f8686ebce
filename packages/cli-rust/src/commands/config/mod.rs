//! Config subcommand implementations
//!
//! Provides `netinv config` subcommands for viewing and managing configuration.

mod get;
mod reset;
mod set;
mod show;

use anyhow::Result;
use clap::{Args, Subcommand};
use netinv_core::Config;

pub use get::cmd_config_get;
pub use reset::cmd_config_reset;
pub use set::cmd_config_set;
pub use show::cmd_config_show;

/// Configuration command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON instead of table format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration management subcommands
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show current configuration
    Show {
        /// Output as JSON instead of table format
        #[arg(long)]
        json: bool,
    },
    /// Get a single configuration value
    Get {
        /// Configuration key (e.g., "worker_count", "ssh_port", "staging_dir")
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key to set (e.g., "workers", "deadline", "user")
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// Handle config command
///
/// Routes to the appropriate handler based on the subcommand.
/// If no subcommand is given, defaults to Show.
pub fn cmd_config(args: ConfigArgs, config: &Config, quiet: bool) -> Result<()> {
    match args.command {
        Some(ConfigSubcommands::Show { json }) => cmd_config_show(config, json, quiet),
        Some(ConfigSubcommands::Get { key }) => cmd_config_get(config, &key, quiet),
        Some(ConfigSubcommands::Set { key, value }) => cmd_config_set(&key, &value, quiet),
        Some(ConfigSubcommands::Reset { force }) => cmd_config_reset(force, quiet),
        None => cmd_config_show(config, args.json, quiet),
    }
}
