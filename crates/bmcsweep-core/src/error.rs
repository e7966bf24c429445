//! Error types for bmcsweep-core

use std::path::PathBuf;

use bmcsweep_redfish::CrawlError;
use thiserror::Error;

/// Errors loading or applying an ID map
#[derive(Error, Debug)]
pub enum IdMapError {
    /// `map_key` names a lookup key that does not exist
    #[error("unknown map key: {0:?}")]
    UnknownMapKey(String),

    /// Map is neither valid JSON nor valid YAML
    #[error("invalid ID map: {0}")]
    Parse(String),

    /// `@path` source could not be read
    #[error("failed to read ID map {path}: {source}")]
    Io {
        /// File that was referenced
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Why a single host produced no record
#[derive(Error, Debug, Clone)]
pub enum CollectError {
    /// Crawling the BMC failed
    #[error(transparent)]
    Crawl(#[from] CrawlError),
}

impl CollectError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CollectError::Crawl(e) => e.is_retryable(),
        }
    }

    /// Check if the BMC refused the credentials
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            CollectError::Crawl(e) => e.is_auth_failure(),
        }
    }
}

/// Errors writing collection output
#[derive(Error, Debug)]
pub enum OutputError {
    /// Output format name not recognised
    #[error("unknown output format: {0:?} (expected json or yaml)")]
    UnknownFormat(String),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors talking to the inventory service
#[derive(Error, Debug)]
pub enum SinkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Service returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body text
        message: String,
    },
}

impl SinkError {
    /// Service already holds a record with this ID
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, SinkError::Api { status: 409, .. })
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Http(e) => e.is_timeout() || e.is_connect(),
            SinkError::Api { status, .. } => *status >= 500,
            SinkError::Url(_) => false,
        }
    }
}

/// Result type for ID map operations
pub type IdMapResult<T> = std::result::Result<T, IdMapError>;

/// Result type for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// Result type for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;
