//! Output utilities for CLI commands
//!
//! Terminal helpers: a spinner with elapsed time for running batches,
//! consistent colors for outcomes, and tables for batch results.

pub mod colors;
pub mod spinner;
pub mod table;

pub use spinner::BatchSpinner;
pub use table::print_batch;
