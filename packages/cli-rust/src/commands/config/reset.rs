//! Config reset subcommand
//!
//! Overwrites the config file with defaults. The previous file is kept as
//! a `.bak` backup by `save_config`.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use netinv_core::{Config, save_config};

/// Reset configuration to defaults
pub fn cmd_config_reset(force: bool, quiet: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Reset all configuration to defaults?")
            .default(false)
            .interact()?;
        if !confirmed {
            if !quiet {
                println!("Reset cancelled.");
            }
            return Ok(());
        }
    }

    save_config(&Config::default())?;

    if !quiet {
        println!(
            "{} Configuration reset to defaults",
            style("Success:").green().bold()
        );
    }
    Ok(())
}
