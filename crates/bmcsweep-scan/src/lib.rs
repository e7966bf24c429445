//! bmcsweep-scan: TCP liveness scanning
//!
//! Probes host/port pairs with a bounded worker pool and reports which ones
//! accepted a connection. Also expands subnets into host lists and caches scan
//! results between runs.

pub mod cache;
pub mod error;
pub mod scanner;
pub mod targets;
pub mod types;

pub use cache::ScanCache;
pub use error::{Result, ScanError};
pub use scanner::{MAX_WORKERS, ScanParams, Scanner, ServiceProbe, effective_workers};
pub use types::{Protocol, RemoteAsset, https_base};
