//! Redfish service probe for the scanner

use std::time::Duration;

use async_trait::async_trait;
use bmcsweep_scan::{ServiceProbe, https_base};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{CrawlError, Result};
use crate::schema::paths;

/// Confirms an open port serves a Redfish service root
///
/// Any HTTP answer other than 404 counts, since most BMCs require
/// authentication even for the service root.
#[derive(Debug, Clone)]
pub struct RedfishProbe {
    client: Client,
}

impl RedfishProbe {
    /// Build a probe
    ///
    /// # Errors
    /// Returns `CrawlError::Transport` if the HTTP client cannot be built.
    pub fn new(timeout: Duration, insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    fn url(host: &str, port: u16) -> String {
        format!("{}{}", https_base(host, port), paths::SERVICE_ROOT)
    }
}

#[async_trait]
impl ServiceProbe for RedfishProbe {
    async fn probe(&self, host: &str, port: u16) -> bool {
        let url = Self::url(host, port);
        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(%url, %status, "probe answered");
                status != StatusCode::NOT_FOUND
            }
            Err(e) => {
                debug!(%url, error = %e, "probe failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "redfish"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_url() {
        assert_eq!(RedfishProbe::url("10.0.0.5", 443), "https://10.0.0.5/redfish/v1/");
        assert_eq!(
            RedfishProbe::url("bmc1", 8443),
            "https://bmc1:8443/redfish/v1/"
        );
        assert_eq!(
            RedfishProbe::url("fe80::1", 5000),
            "https://[fe80::1]:5000/redfish/v1/"
        );
        assert!(url::Url::parse(&RedfishProbe::url("fe80::1", 5000)).is_ok());
    }

    #[tokio::test]
    async fn test_probe_fails_on_plain_tcp_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // accept and immediately drop, so the TLS handshake fails
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let probe = RedfishProbe::new(Duration::from_secs(2), true).unwrap();
        assert!(!probe.probe("127.0.0.1", port).await);
    }
}
