//! Error types for bmcsweep-redfish

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while crawling a BMC
#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    /// Service root returned 404; the endpoint does not speak Redfish
    #[error("not a BMC: {0} has no Redfish service root")]
    NotABmc(String),

    /// BMC rejected the credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connection, TLS or protocol failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status on a Redfish resource
    #[error("HTTP {status} from {path}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Resource path
        path: String,
        /// Response body text
        message: String,
    },

    /// Response body was not the expected Redfish JSON
    #[error("invalid response from {path}: {message}")]
    InvalidResponse {
        /// Resource path
        path: String,
        /// Parse failure
        message: String,
    },

    /// Target URI could not be parsed
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Whole crawl exceeded its time budget
    #[error("crawl timed out after {0:?}")]
    Timeout(Duration),
}

impl CrawlError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrawlError::Transport(_) | CrawlError::Timeout(_))
    }

    /// Check if the BMC refused the credentials
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, CrawlError::AuthenticationFailed(_))
    }

    /// Errors that make the rest of the host's crawl pointless
    ///
    /// A failed sub-resource (one interface, one chassis) is absorbed by the
    /// walker; these are not.
    #[must_use]
    pub fn aborts_host(&self) -> bool {
        matches!(
            self,
            CrawlError::NotABmc(_)
                | CrawlError::AuthenticationFailed(_)
                | CrawlError::Transport(_)
                | CrawlError::InvalidUri(_)
                | CrawlError::Timeout(_)
        )
    }
}

impl From<url::ParseError> for CrawlError {
    fn from(e: url::ParseError) -> Self {
        CrawlError::InvalidUri(e.to_string())
    }
}

/// Result type for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;
