//! Color utilities for CLI output
//!
//! Table colors for host outcomes and failure reasons.

use comfy_table::Color;
use netinv_core::FailureReason;

/// Green for success, red for failure
pub fn outcome_color(success: bool) -> Color {
    if success { Color::Green } else { Color::Red }
}

/// Table color for a failure reason
///
/// - connection -> red
/// - precondition -> yellow
/// - command execution -> magenta
/// - cancelled -> dark grey
pub fn reason_color(reason: Option<FailureReason>) -> Color {
    match reason {
        None => Color::Reset,
        Some(FailureReason::ConnectionError) => Color::Red,
        Some(FailureReason::PreconditionError) => Color::Yellow,
        Some(FailureReason::CommandExecutionError) => Color::Magenta,
        Some(FailureReason::Cancelled) => Color::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_colors_differ() {
        assert_eq!(outcome_color(true), Color::Green);
        assert_eq!(outcome_color(false), Color::Red);
    }

    #[test]
    fn reasons_get_distinct_colors() {
        let colors = [
            reason_color(Some(FailureReason::ConnectionError)),
            reason_color(Some(FailureReason::PreconditionError)),
            reason_color(Some(FailureReason::CommandExecutionError)),
            reason_color(Some(FailureReason::Cancelled)),
        ];
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(reason_color(None), Color::Reset);
    }
}
