//! Batch result tables

use comfy_table::{Cell, Color, Table};
use console::style;
use netinv_core::{BatchResult, HostOutcome, OperationKind, ScanFact};

use super::colors::{outcome_color, reason_color};

/// Print the operation line and the tables a batch produced
pub fn print_batch(result: &BatchResult) {
    println!(
        "{} {}",
        style(result.operation.kind.to_string()).cyan().bold(),
        style(&result.operation.detail).dim()
    );

    if result.operation.kind == OperationKind::Scan && !result.scan_facts.is_empty() {
        println!("{}", scan_table(&result.scan_facts));
    }
    if !result.outcomes.is_empty() {
        println!("{}", outcome_table(&result.outcomes));
    }

    let elapsed = (result.finished_at - result.started_at)
        .to_std()
        .unwrap_or_default();
    println!(
        "{} succeeded, {} failed in {}",
        style(result.succeeded()).green(),
        if result.failed() > 0 {
            style(result.failed()).red().bold()
        } else {
            style(result.failed()).dim()
        },
        humantime::format_duration(std::time::Duration::from_secs(elapsed.as_secs()))
    );
}

/// One row per host outcome, in completion order
pub fn outcome_table(outcomes: &[HostOutcome]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Host", "Result", "Reason", "Message", "Finished"]);

    for outcome in outcomes {
        let reason = outcome
            .reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&outcome.host),
            Cell::new(if outcome.success { "ok" } else { "failed" })
                .fg(outcome_color(outcome.success)),
            Cell::new(reason).fg(reason_color(outcome.reason)),
            Cell::new(&outcome.message),
            Cell::new(
                outcome
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S")
                    .to_string(),
            ),
        ]);
    }
    table
}

/// One row per scanned host, reachable hosts first
pub fn scan_table(facts: &[ScanFact]) -> Table {
    let mut sorted: Vec<&ScanFact> = facts.iter().collect();
    sorted.sort_by_key(|f| !f.reachable);

    let mut table = Table::new();
    table.set_header(vec!["Host", "Status", "Hostnames", "Open ports", "OS", "MAC"]);

    for fact in sorted {
        let status = if fact.reachable {
            Cell::new("up").fg(Color::Green)
        } else {
            Cell::new("down").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&fact.host),
            status,
            Cell::new(fact.hostnames.join(", ")),
            Cell::new(fact.open_ports.join("\n")),
            Cell::new(fact.os_guesses.first().cloned().unwrap_or_default()),
            Cell::new(format_mac(fact)),
        ]);
    }
    table
}

fn format_mac(fact: &ScanFact) -> String {
    match (&fact.mac_address, &fact.vendor) {
        (Some(mac), Some(vendor)) => format!("{mac} ({vendor})"),
        (Some(mac), None) => mac.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netinv_core::FailureReason;

    #[test]
    fn outcome_rows_show_reason() {
        let outcomes = vec![
            HostOutcome::success("10.0.0.1", "installed ahenk"),
            HostOutcome::failure("10.0.0.2", FailureReason::Cancelled, "batch deadline passed"),
        ];
        let rendered = outcome_table(&outcomes).to_string();
        assert!(rendered.contains("10.0.0.1"));
        assert!(rendered.contains("installed ahenk"));
        assert!(rendered.contains("cancelled"));
    }

    #[test]
    fn scan_rows_list_reachable_first() {
        let facts = vec![
            ScanFact::unreachable("10.0.0.9"),
            ScanFact {
                host: "10.0.0.3".to_string(),
                reachable: true,
                open_ports: vec!["22/tcp ssh".to_string()],
                mac_address: Some("00:11:22:33:44:55".to_string()),
                vendor: Some("Acme".to_string()),
                ..Default::default()
            },
        ];
        let rendered = scan_table(&facts).to_string();
        let up = rendered.find("10.0.0.3").unwrap();
        let down = rendered.find("10.0.0.9").unwrap();
        assert!(up < down);
        assert!(rendered.contains("00:11:22:33:44:55 (Acme)"));
    }
}
