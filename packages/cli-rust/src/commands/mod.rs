//! CLI command implementations
//!
//! Batch commands (install, distribute, scan) plus result and
//! configuration management.

mod batch;
mod config;
mod distribute;
mod install;
mod results;
mod scan;

pub use config::{ConfigArgs, cmd_config};
pub use distribute::{DistributeArgs, cmd_distribute};
pub use install::{InstallArgs, cmd_install};
pub use results::{ResultsArgs, cmd_results};
pub use scan::{ScanArgs, cmd_scan};
