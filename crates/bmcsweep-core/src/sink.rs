//! Forwarding records to the inventory service

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{SinkError, SinkResult};
use crate::record::InventoryRecord;

/// Extra request headers
pub type Headers = BTreeMap<String, String>;

/// Collection path under the inventory service base URL
pub const ENDPOINTS_PATH: &str = "hsm/v2/Inventory/RedfishEndpoints";

/// Destination for collected records
#[async_trait]
pub trait InventorySink: Send + Sync {
    /// Create a new endpoint record
    ///
    /// # Errors
    /// Returns `SinkError::Api` carrying status and body for non-2xx responses.
    async fn add(&self, record: &InventoryRecord, headers: &Headers) -> SinkResult<()>;

    /// Replace an existing endpoint record
    ///
    /// # Errors
    /// Returns `SinkError::Api` carrying status and body for non-2xx responses.
    async fn update(&self, record: &InventoryRecord, headers: &Headers) -> SinkResult<()>;
}

/// Inventory service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpInventorySink {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpInventorySink {
    /// Create a sink for the service at `base_url`
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: impl AsRef<str>,
        token: Option<String>,
        insecure: bool,
        timeout: Duration,
    ) -> SinkResult<Self> {
        let mut base = base_url.as_ref().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token,
        })
    }

    fn collection_url(&self) -> SinkResult<Url> {
        Ok(self.base_url.join(ENDPOINTS_PATH)?)
    }

    fn record_url(&self, id: &str) -> SinkResult<Url> {
        Ok(self.base_url.join(&format!("{ENDPOINTS_PATH}/{id}"))?)
    }

    fn prepare(&self, mut request: RequestBuilder, headers: &Headers) -> RequestBuilder {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> SinkResult<()> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Api { status, message });
        }
        Ok(())
    }
}

#[async_trait]
impl InventorySink for HttpInventorySink {
    async fn add(&self, record: &InventoryRecord, headers: &Headers) -> SinkResult<()> {
        let url = self.collection_url()?;
        let request = self.prepare(self.client.post(url).json(record), headers);
        self.send(request).await
    }

    async fn update(&self, record: &InventoryRecord, headers: &Headers) -> SinkResult<()> {
        let url = self.record_url(&record.id)?;
        let request = self.prepare(self.client.put(url).json(record), headers);
        self.send(request).await
    }
}

/// Tally of a forwarding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Newly added records
    pub added: usize,
    /// Existing records replaced
    pub updated: usize,
    /// Records already present and left alone
    pub conflicts: usize,
    /// Records the service rejected
    pub failed: usize,
}

/// Add every record; on conflict replace it when `force_update` is set
///
/// Failures are logged per record and never stop the run.
#[instrument(skip_all, fields(records = records.len(), force_update = force_update))]
pub async fn forward_records(
    sink: &dyn InventorySink,
    records: &[InventoryRecord],
    headers: &Headers,
    force_update: bool,
) -> ForwardSummary {
    let mut summary = ForwardSummary::default();

    for record in records {
        match sink.add(record, headers).await {
            Ok(()) => {
                debug!(id = %record.id, "added record");
                summary.added += 1;
            }
            Err(e) if e.is_conflict() && force_update => {
                match sink.update(record, headers).await {
                    Ok(()) => {
                        debug!(id = %record.id, "updated existing record");
                        summary.updated += 1;
                    }
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "failed to update record");
                        summary.failed += 1;
                    }
                }
            }
            Err(e) if e.is_conflict() => {
                warn!(id = %record.id, "record already exists, use force_update to replace it");
                summary.conflicts += 1;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "failed to add record");
                summary.failed += 1;
            }
        }
    }

    info!(
        added = summary.added,
        updated = summary.updated,
        conflicts = summary.conflicts,
        failed = summary.failed,
        "forwarded records"
    );
    summary
}
