//! Error types for bmcsweep-scan

use thiserror::Error;

/// Errors that can occur while preparing or persisting a scan
///
/// Per-host connection failures are not errors; they simply produce no record.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Target could not be parsed as a host, URI or subnet
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Subnet mask could not be parsed
    #[error("invalid subnet mask: {0}")]
    InvalidMask(String),

    /// Subnet would expand to more hosts than a single run should probe
    #[error("subnet {subnet} is too large (/{prefix}, minimum /{min})")]
    SubnetTooLarge {
        /// Subnet as given
        subnet: String,
        /// Prefix length of the subnet
        prefix: u8,
        /// Smallest accepted prefix length
        min: u8,
    },

    /// Scan cache could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error on the scan cache
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;
