//! Scan result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol probed by the scanner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain TCP connect
    #[default]
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// One probed host/port pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Protocol used for the probe
    #[serde(default)]
    pub protocol: Protocol,
    /// Whether the connection succeeded within the timeout
    pub state: bool,
    /// When the probe finished
    pub timestamp: DateTime<Utc>,
}

impl RemoteAsset {
    /// Create a TCP asset record stamped with the current time
    pub fn tcp(host: impl Into<String>, port: u16, state: bool) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Protocol::Tcp,
            state,
            timestamp: Utc::now(),
        }
    }

    /// Base URI for talking HTTPS to this asset
    #[must_use]
    pub fn uri(&self) -> String {
        https_base(&self.host, self.port)
    }
}

/// `https://host[:port]`, with IPv6 literals in brackets and 443 left implicit
#[must_use]
pub fn https_base(host: &str, port: u16) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    if port == 443 {
        format!("https://{host}")
    } else {
        format!("https://{host}:{port}")
    }
}
