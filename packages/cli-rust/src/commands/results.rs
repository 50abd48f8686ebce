//! Results command implementation
//!
//! Reads batches stored under the results directory.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;
use netinv_core::address::to_range_expr;
use netinv_core::config::paths::get_results_dir;
use netinv_core::{BatchResult, JsonResultStore, OperationKind};

use crate::output::print_batch;

/// Arguments for the results command
#[derive(Args, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub command: ResultsSubcommands,
}

#[derive(Subcommand, Debug)]
pub enum ResultsSubcommands {
    /// Show the most recent batch of a kind (install, distribute, scan)
    Last {
        kind: OperationKind,

        /// Output as JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Print only the failed hosts, ready for --hosts
        #[arg(long, conflicts_with = "json")]
        failed: bool,
    },
    /// List stored batch files of a kind, oldest first
    List { kind: OperationKind },
}

pub fn cmd_results(args: ResultsArgs, quiet: bool) -> Result<()> {
    let dir = get_results_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine results directory"))?;
    let store = JsonResultStore::new(dir);

    match args.command {
        ResultsSubcommands::Last { kind, json, failed } => {
            let result = store.load_latest(kind)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if failed {
                println!("{}", failed_hosts_expr(&result));
            } else {
                if !quiet {
                    println!(
                        "{} {} batch started {}",
                        style("Last").bold(),
                        kind,
                        style(result.started_at.to_rfc3339()).dim()
                    );
                }
                print_batch(&result);
            }
        }
        ResultsSubcommands::List { kind } => {
            let files = store.list(kind)?;
            if files.is_empty() && !quiet {
                println!("No stored {kind} results in {}", store.dir().display());
            }
            for file in files {
                println!("{}", file.display());
            }
        }
    }
    Ok(())
}

fn failed_hosts_expr(result: &BatchResult) -> String {
    to_range_expr(result.failed_hosts().hosts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netinv_core::{FailureReason, HostOutcome, OperationSummary, ResultAggregator};

    #[test]
    fn failed_hosts_collapse_to_a_range() {
        let agg = ResultAggregator::new(OperationSummary {
            kind: OperationKind::Install,
            detail: "apt-get ahenk".to_string(),
            access_method: None,
            username: None,
            port: 22,
        });
        agg.record(HostOutcome::success("10.0.0.1", "installed"));
        for host in ["10.0.0.2", "10.0.0.3", "10.0.0.4"] {
            agg.record(HostOutcome::failure(
                host,
                FailureReason::ConnectionError,
                "timed out",
            ));
        }
        assert_eq!(failed_hosts_expr(&agg.snapshot()), "10.0.0.2-10.0.0.4");
    }
}
