//! netinv-core - Core library for netinv
//!
//! Runs one operation (package install, file distribution or port scan)
//! across many hosts with a bounded number of concurrent workers, isolating
//! every host's failure and collecting a per-host result set.

pub mod address;
pub mod config;
pub mod error;
pub mod operation;
pub mod orchestrator;
pub mod params;
pub mod partition;
pub mod pool;
pub mod result;
pub mod scanner;
pub mod session;
pub mod store;
pub mod version;

pub use address::{TargetSet, collapse, expand};
pub use config::{Config, load_config, save_config};
pub use error::{FailureReason, InputError};
pub use operation::{
    AccessMethod, Credentials, Operation, OperationKind, OperationSpec, OperationSummary,
    PackageSource,
};
pub use orchestrator::{Orchestrator, RunSettings};
pub use params::from_parameter_map;
pub use result::{BatchResult, HostOutcome, ResultAggregator};
pub use scanner::{NmapScanner, PortScanner, ScanError, ScanFact};
pub use session::{OpenSshFactory, RemoteSession, SessionError, SessionFactory};
pub use store::{JsonResultStore, ResultSink, StoreError};
pub use version::{get_version, get_version_long};
