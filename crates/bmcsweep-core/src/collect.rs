//! Collection orchestrator
//!
//! Fans live scan results out to a bounded worker pool. Each worker maps the
//! BMC to an inventory ID, crawls systems and managers, and assembles an
//! [`InventoryRecord`]. A host that already produced a record is not crawled
//! again, and per-host failures are reported in [`CollectOutcome::statuses`]
//! without affecting other hosts.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use bmcsweep_redfish::{BmcCrawler, CrawlerConfig, DEFAULT_CRAWL_TIMEOUT, resolve_credentials};
use bmcsweep_scan::{RemoteAsset, effective_workers};
use bmcsweep_secrets::{BmcCredentials, SecretStore};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::CollectError;
use crate::idmap::{IdMapper, LookupKeys};
use crate::record::InventoryRecord;

/// Collection settings
#[derive(Debug, Clone)]
pub struct CollectParams {
    /// Worker count; `0` picks `min(hosts, 255)`
    pub concurrency: usize,
    /// Whole-crawl budget per BMC and crawl kind
    pub timeout: Duration,
    /// Skip TLS certificate validation
    pub insecure: bool,
    /// Fall back to the `"default"` secret
    pub use_default: bool,
    /// Credentials that override the secret store for every host
    pub credentials: Option<BmcCredentials>,
}

impl Default for CollectParams {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout: DEFAULT_CRAWL_TIMEOUT,
            insecure: false,
            use_default: true,
            credentials: None,
        }
    }
}

/// What happened to one scanned endpoint
#[derive(Debug, Clone)]
pub enum HostOutcome {
    /// A record was produced under this ID
    Collected(String),
    /// Deliberately not collected
    Skipped(String),
    /// Crawl failed
    Failed(CollectError),
}

impl fmt::Display for HostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOutcome::Collected(id) => write!(f, "collected as {id}"),
            HostOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            HostOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Per-endpoint status line
#[derive(Debug, Clone)]
pub struct HostStatus {
    /// Scanned host
    pub host: String,
    /// Scanned port
    pub port: u16,
    /// Result for this endpoint
    pub outcome: HostOutcome,
}

/// Result of a collection run
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    /// Records for successfully collected BMCs
    pub records: Vec<InventoryRecord>,
    /// One status per live endpoint considered
    pub statuses: Vec<HostStatus>,
}

impl CollectOutcome {
    /// Statuses of endpoints whose crawl failed
    pub fn failures(&self) -> impl Iterator<Item = &HostStatus> {
        self.statuses
            .iter()
            .filter(|s| matches!(s.outcome, HostOutcome::Failed(_)))
    }
}

/// Shared by every worker of one run
struct WorkerContext {
    crawler: BmcCrawler,
    mapper: Arc<dyn IdMapper>,
    store: Arc<dyn SecretStore>,
    params: CollectParams,
    /// host -> "record produced" flag; the inner lock serializes crawls of one host
    found: StdMutex<HashMap<String, Arc<Mutex<bool>>>>,
}

impl WorkerContext {
    fn host_lock(&self, host: &str) -> Arc<Mutex<bool>> {
        let mut found = self.found.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(found.entry(host.to_string()).or_default())
    }

    async fn process(&self, asset: &RemoteAsset) -> (HostStatus, Option<InventoryRecord>) {
        let host_lock = self.host_lock(&asset.host);
        let mut found = host_lock.lock().await;

        let (outcome, record) = if *found {
            trace!(host = %asset.host, port = asset.port, "host already collected");
            (HostOutcome::Skipped("host already collected".into()), None)
        } else {
            match self.collect_asset(asset).await {
                Ok(record) => {
                    *found = true;
                    (HostOutcome::Collected(record.id.clone()), Some(record))
                }
                Err(outcome) => (outcome, None),
            }
        };

        let status = HostStatus {
            host: asset.host.clone(),
            port: asset.port,
            outcome,
        };
        (status, record)
    }

    #[instrument(skip_all, fields(host = %asset.host, port = asset.port))]
    async fn collect_asset(
        &self,
        asset: &RemoteAsset,
    ) -> std::result::Result<InventoryRecord, HostOutcome> {
        let keys = LookupKeys::for_host(&asset.host);
        let Some(id) = self.mapper.mapped_id(&keys) else {
            warn!(mapper = self.mapper.name(), "no inventory ID, skipping");
            return Err(HostOutcome::Skipped("no inventory ID".into()));
        };

        let mut config = CrawlerConfig::new(asset.uri(), Arc::clone(&self.store))
            .with_insecure(self.params.insecure)
            .with_use_default(self.params.use_default)
            .with_timeout(self.params.timeout);
        if let Some(creds) = &self.params.credentials {
            config = config.with_credentials(creds.clone());
        }
        let (credentials, source) = resolve_credentials(&config);
        debug!(%source, "credentials resolved for host");
        let user = credentials.username.clone();
        let config = config.with_credentials(credentials);

        let systems = self.crawler.crawl_systems(&config).await.map_err(|e| {
            warn!(error = %e, "system crawl failed");
            HostOutcome::Failed(e.into())
        })?;
        let managers = self.crawler.crawl_managers(&config).await.map_err(|e| {
            warn!(error = %e, "manager crawl failed");
            HostOutcome::Failed(e.into())
        })?;

        if systems.is_empty() && managers.is_empty() {
            warn!("BMC reported no systems or managers");
            return Err(HostOutcome::Skipped("no systems or managers".into()));
        }

        let mut record = InventoryRecord::new(id, &asset.host, user, systems, managers);
        if !record.correlate_mac(&asset.host) {
            debug!("no manager interface matches host address, MACAddr omitted");
        }

        info!(
            id = %record.id,
            systems = record.systems.len(),
            managers = record.managers.len(),
            "collected BMC"
        );
        Ok(record)
    }
}

/// Crawls live endpoints into inventory records
pub struct Collector {
    crawler: BmcCrawler,
    mapper: Arc<dyn IdMapper>,
    store: Arc<dyn SecretStore>,
    params: CollectParams,
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("mapper", &self.mapper.name())
            .field("store", &self.store.store_type())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Collector {
    /// Create a collector
    pub fn new(
        crawler: BmcCrawler,
        mapper: Arc<dyn IdMapper>,
        store: Arc<dyn SecretStore>,
        params: CollectParams,
    ) -> Self {
        Self {
            crawler,
            mapper,
            store,
            params,
        }
    }

    /// Collect every live asset
    ///
    /// Assets with `state == false` are ignored. Records and statuses are in
    /// completion order.
    #[instrument(skip_all, fields(assets = assets.len()))]
    pub async fn collect(&self, assets: &[RemoteAsset]) -> CollectOutcome {
        let live: Vec<RemoteAsset> = assets.iter().filter(|a| a.state).cloned().collect();
        if live.is_empty() {
            info!("no live endpoints to collect");
            return CollectOutcome::default();
        }

        let workers = effective_workers(self.params.concurrency, live.len());
        info!(workers, endpoints = live.len(), "starting collection");

        let ctx = Arc::new(WorkerContext {
            crawler: self.crawler.clone(),
            mapper: Arc::clone(&self.mapper),
            store: Arc::clone(&self.store),
            params: self.params.clone(),
            found: StdMutex::new(HashMap::new()),
        });

        let (work_tx, work_rx) = mpsc::channel::<RemoteAsset>(workers + 1);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(HostStatus, Option<InventoryRecord>)>(workers + 1);

        let aggregator = tokio::spawn(async move {
            let mut outcome = CollectOutcome::default();
            while let Some((status, record)) = result_rx.recv().await {
                if let Some(record) = record {
                    outcome.records.push(record);
                }
                outcome.statuses.push(status);
            }
            outcome
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let ctx = Arc::clone(&ctx);

            handles.push(tokio::spawn(async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some(asset) = next else {
                        break;
                    };

                    let result = ctx.process(&asset).await;
                    if result_tx.send(result).await.is_err() {
                        return;
                    }
                }
                trace!(worker_id, "collect worker finished");
            }));
        }
        drop(result_tx);

        for asset in live {
            if work_tx.send(asset).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "collect worker panicked");
            }
        }

        let outcome = match aggregator.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "collect aggregator failed");
                CollectOutcome::default()
            }
        };

        info!(
            records = outcome.records.len(),
            failed = outcome.failures().count(),
            "collection completed"
        );
        outcome
    }
}
