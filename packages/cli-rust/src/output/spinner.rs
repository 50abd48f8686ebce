//! Batch spinner with elapsed time display
//!
//! Shows that a batch is running and, once it has drained, how it went.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use netinv_core::{BatchResult, OperationKind};

/// A spinner for one batch run
///
/// Becomes a no-op in quiet or JSON mode so stdout stays machine-readable.
pub struct BatchSpinner {
    bar: Option<ProgressBar>,
}

impl BatchSpinner {
    /// Start spinning for a `kind` batch over `hosts` hosts
    ///
    /// Shows: `spinner message (HH:MM:SS)`
    pub fn new(kind: OperationKind, hosts: usize) -> Self {
        let style = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed_precise:.dim})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("\u{28CB}\u{2819}\u{2839}\u{2838}\u{283C}\u{2834}\u{2826}\u{2827}\u{2807}\u{280F}");

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(running_message(kind, hosts));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub fn new_maybe(kind: OperationKind, hosts: usize, quiet: bool) -> Self {
        if quiet {
            Self { bar: None }
        } else {
            Self::new(kind, hosts)
        }
    }

    /// Finish with a checkmark when every host succeeded, a cross otherwise
    pub fn finish(self, result: &BatchResult) {
        let message = finished_message(result);
        if result.failed() == 0 {
            self.success(&message);
        } else {
            self.fail(&message);
        }
    }

    pub fn success(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!(
                "{} {}",
                console::style("\u{2713}").green(),
                message
            ));
        }
    }

    pub fn fail(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!("{} {}", console::style("\u{2717}").red(), message));
        }
    }
}

fn running_message(kind: OperationKind, hosts: usize) -> String {
    let noun = if hosts == 1 { "host" } else { "hosts" };
    format!("Running {kind} on {hosts} {noun}...")
}

fn finished_message(result: &BatchResult) -> String {
    let kind = result.operation.kind;
    match kind {
        OperationKind::Scan => {
            let up = result.scan_facts.iter().filter(|f| f.reachable).count();
            format!(
                "scan finished: {up} of {} hosts up",
                result.scan_facts.len()
            )
        }
        _ => format!(
            "{kind} finished: {} succeeded, {} failed",
            result.succeeded(),
            result.failed()
        ),
    }
}
