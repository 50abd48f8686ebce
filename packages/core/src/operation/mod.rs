//! Host operations
//!
//! This module covers what is done to each target:
//! - Operation descriptions and credentials (`spec`)
//! - Remote shell command templates (`commands`)
//! - The per-host protocol and the scan task (`protocol`)

pub mod commands;
mod protocol;
mod spec;

pub use protocol::{ExecContext, HostOperation, ProtocolState};
pub use spec::{
    AccessMethod, Credentials, DEFAULT_SSH_PORT, Operation, OperationKind, OperationSpec,
    OperationSummary, PackageSource, normalize_directory,
};
