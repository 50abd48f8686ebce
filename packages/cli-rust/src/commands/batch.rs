//! Shared plumbing for batch commands
//!
//! Every batch command turns its arguments into the flat parameter map the
//! core accepts from any front end, then runs it through one orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use dialoguer::Password;
use netinv_core::config::ensure_results_dir;
use netinv_core::params;
use netinv_core::{
    BatchResult, Config, JsonResultStore, Orchestrator, RunSettings, from_parameter_map,
};

use crate::output::{BatchSpinner, print_batch};

/// Environment variable consulted before prompting for the SSH password
pub const PASSWORD_ENV: &str = "NETINV_PASSWORD";

pub type Params = HashMap<String, String>;

/// Which hosts to run against and how
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Comma-separated hosts, addresses or ranges
    #[arg(long, short = 'H', value_name = "LIST")]
    pub hosts: Option<String>,

    /// Address range such as 192.168.1.10-50 or 10.0.0.0/24 (wins over --hosts)
    #[arg(long, short = 'r', value_name = "RANGE")]
    pub range: Option<String>,

    /// Concurrent workers (default: worker_count from config)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Cancel hosts that have not started after this long, e.g. "10m"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Print the batch result as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not store this batch under the results directory
    #[arg(long)]
    pub no_save: bool,
}

impl TargetArgs {
    pub fn apply(&self, map: &mut Params) -> Result<()> {
        if self.hosts.is_none() && self.range.is_none() {
            bail!("No targets given. Use --hosts or --range.");
        }
        if let Some(range) = &self.range {
            map.insert(params::IP_RANGE.to_string(), range.clone());
        }
        if let Some(hosts) = &self.hosts {
            map.insert(params::IP_LIST.to_string(), hosts.clone());
        }
        Ok(())
    }

    /// Config settings with command line overrides applied
    pub fn settings(&self, config: &Config) -> Result<RunSettings> {
        let mut settings = RunSettings::from(config);
        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("--workers must be at least 1");
            }
            settings.worker_count = workers;
        }
        if let Some(deadline) = self.deadline {
            settings.batch_deadline = Some(deadline);
        }
        Ok(settings)
    }
}

/// SSH login for install and distribute
#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Login user (default: default_user from config, else the local user)
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// SSH port (default: ssh_port from config)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Private key to log in with instead of a password
    #[arg(long, short = 'i', value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// Prompt for the private key passphrase
    #[arg(long, requires = "identity")]
    pub ask_passphrase: bool,
}

impl LoginArgs {
    /// Add login fields, prompting for secrets not given otherwise
    pub fn apply(&self, config: &Config, map: &mut Params) -> Result<()> {
        let user = self.user.clone().unwrap_or_else(|| config.login_user());
        let port = self.port.unwrap_or(config.ssh_port);

        map.insert(params::USERNAME.to_string(), user.clone());
        map.insert(params::PORT.to_string(), port.to_string());

        match &self.identity {
            Some(key) => {
                map.insert(params::ACCESS_METHOD.to_string(), "PRIVATE_KEY".to_string());
                map.insert(params::PRIVATE_KEY.to_string(), key.display().to_string());
                if self.ask_passphrase {
                    let passphrase = Password::new()
                        .with_prompt(format!("Passphrase for {}", key.display()))
                        .interact()?;
                    map.insert(params::PASSPHRASE.to_string(), passphrase);
                }
            }
            None => {
                let password = match std::env::var(PASSWORD_ENV) {
                    Ok(password) if !password.is_empty() => password,
                    _ => Password::new()
                        .with_prompt(format!("SSH password for {user}"))
                        .interact()?,
                };
                map.insert(
                    params::ACCESS_METHOD.to_string(),
                    "USERNAME_PASSWORD".to_string(),
                );
                map.insert(params::PASSWORD.to_string(), password);
            }
        }
        Ok(())
    }
}

/// Validate, run and report one batch
///
/// Returns an error when any host failed so the exit status reflects it.
pub async fn run_batch(
    map: &Params,
    targets: &TargetArgs,
    config: &Config,
    quiet: bool,
) -> Result<BatchResult> {
    let (spec, target_set) = from_parameter_map(map).context("Invalid batch parameters")?;
    let settings = targets.settings(config)?;

    let kind = spec.kind();
    tracing::debug!(
        kind = %kind,
        hosts = target_set.len(),
        workers = settings.worker_count,
        deadline = ?settings.batch_deadline,
        "Parsed batch parameters"
    );

    let orchestrator = Orchestrator::from_config(config).with_settings(settings);

    let spinner = BatchSpinner::new_maybe(kind, target_set.len(), quiet || targets.json);

    let result = if config.save_results && !targets.no_save {
        let store = JsonResultStore::new(ensure_results_dir()?);
        orchestrator.run_and_persist(spec, target_set, &store).await
    } else {
        orchestrator.run(spec, target_set).await
    };

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            spinner.fail(&format!("{kind} rejected"));
            return Err(e.into());
        }
    };
    spinner.finish(&result);

    if targets.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_batch(&result);
    }

    if result.failed() > 0 {
        bail!(
            "{} of {} hosts failed",
            result.failed(),
            result.outcomes.len()
        );
    }
    Ok(result)
}

/// Map holding just the `operation` key
pub fn base_params(operation: &str) -> Params {
    let mut map = Params::new();
    map.insert(params::OPERATION.to_string(), operation.to_string());
    map
}
