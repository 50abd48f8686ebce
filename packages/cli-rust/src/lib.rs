//! netinv CLI - Install packages on, copy files to and scan fleets of SSH hosts
//!
//! This module contains the CLI implementation used by the binary.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use netinv_core::{config, get_version, get_version_long, load_config};
use tracing_subscriber::EnvFilter;

/// Run one operation across many SSH hosts
#[derive(Parser)]
#[command(name = "netinv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Install packages on, copy files to and scan fleets of SSH hosts", long_about = None)]
#[command(after_help = get_banner())]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package on every target host
    Install(commands::InstallArgs),
    /// Copy a file to every target host
    Distribute(commands::DistributeArgs),
    /// Scan target hosts for open ports and OS details
    Scan(commands::ScanArgs),
    /// Show stored batch results
    Results(commands::ResultsArgs),
    /// Manage configuration
    Config(commands::ConfigArgs),
}

/// Get the ASCII banner for help display
fn get_banner() -> &'static str {
    r#"
            _   _
 _ __   ___| |_(_)_ ____   __
| '_ \ / _ \ __| | '_ \ \ / /
| | | |  __/ |_| | | | \ V /
|_| |_|\___|\__|_|_| |_|\_/
"#
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level from warn.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "netinv={default_level},netinv_core={default_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Configure color output
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Load config (creates default if missing)
    let config_path = config::paths::get_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            // Display rich error for invalid config
            eprintln!("{} Configuration error", style("Error:").red().bold());
            eprintln!();
            eprintln!("  {e:#}");
            eprintln!();
            eprintln!("  Config file: {}", style(config_path.display()).yellow());
            eprintln!();
            eprintln!(
                "  {} Check the config file for syntax errors or unknown fields.",
                style("Tip:").cyan()
            );
            eprintln!(
                "  {} Run {} to start over from defaults.",
                style("Tip:").cyan(),
                style("netinv config reset").green()
            );
            std::process::exit(1);
        }
    };

    // Show verbose info if requested
    if cli.verbose > 0 {
        let results_dir = config::paths::get_results_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        eprintln!(
            "{} Config: {}",
            style("[info]").cyan(),
            config_path.display()
        );
        eprintln!("{} Results: {}", style("[info]").cyan(), results_dir);
    }

    match cli.command {
        Some(Commands::Install(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_install(args, &config, cli.quiet))
        }
        Some(Commands::Distribute(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_distribute(args, &config, cli.quiet))
        }
        Some(Commands::Scan(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_scan(args, &config, cli.quiet))
        }
        Some(Commands::Results(args)) => commands::cmd_results(args, cli.quiet),
        Some(Commands::Config(args)) => commands::cmd_config(args, &config, cli.quiet),
        None => {
            // No command - show a welcome message and hint to use --help
            if !cli.quiet {
                let version = if cli.verbose > 0 {
                    get_version_long()
                } else {
                    get_version()
                };
                println!("{} {}", style("netinv").cyan().bold(), style(version).dim());
                println!();
                println!("Run {} for available commands.", style("--help").green());
            }
            Ok(())
        }
    }
}
