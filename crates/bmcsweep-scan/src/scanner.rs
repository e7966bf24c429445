//! Bounded worker-pool TCP scanner

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, trace};

use crate::types::RemoteAsset;

/// Upper bound on the default worker count
pub const MAX_WORKERS: usize = 255;

/// Second-stage check run against ports that accepted a TCP connection
///
/// Lets callers keep only endpoints that actually speak the expected service.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Return `true` if `host:port` answers like the expected service
    async fn probe(&self, host: &str, port: u16) -> bool;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Scanner settings
#[derive(Clone)]
pub struct ScanParams {
    /// Worker count; `0` picks `min(hosts, 255)`
    pub concurrency: usize,
    /// Per-connection timeout
    pub timeout: Duration,
    /// Drop closed ports from the result instead of reporting `state = false`
    pub keep_open_only: bool,
    /// Optional service check for open ports
    pub probe: Option<Arc<dyn ServiceProbe>>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout: Duration::from_secs(5),
            keep_open_only: true,
            probe: None,
        }
    }
}

impl std::fmt::Debug for ScanParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanParams")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("keep_open_only", &self.keep_open_only)
            .field("probe", &self.probe.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Number of workers to spawn for `host_count` hosts
///
/// An explicit request is honoured as-is; `0` defaults to one worker per host,
/// clamped to `[1, MAX_WORKERS]`.
#[must_use]
pub fn effective_workers(requested: usize, host_count: usize) -> usize {
    if requested == 0 {
        host_count.clamp(1, MAX_WORKERS)
    } else {
        requested
    }
}

/// TCP liveness scanner
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    params: ScanParams,
}

impl Scanner {
    /// Create a scanner with the given settings
    #[must_use]
    pub fn new(params: ScanParams) -> Self {
        Self { params }
    }

    /// Scanner settings
    #[must_use]
    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Probe every `(host, port)` pair
    ///
    /// Hosts are distributed over a bounded work channel; each worker tries the
    /// ports of its host one after another. Results are gathered by a single
    /// aggregator task. Order of the returned assets is completion order.
    #[instrument(skip_all, fields(hosts = hosts.len(), ports = ports.len()))]
    pub async fn scan(&self, hosts: &[String], ports: &[u16]) -> Vec<RemoteAsset> {
        if hosts.is_empty() || ports.is_empty() {
            debug!("nothing to scan");
            return Vec::new();
        }

        let workers = effective_workers(self.params.concurrency, hosts.len());
        info!(workers, timeout = ?self.params.timeout, "starting scan");

        let (work_tx, work_rx) = mpsc::channel::<String>(workers + 1);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<RemoteAsset>(workers + 1);

        let aggregator = tokio::spawn(async move {
            let mut assets = Vec::new();
            while let Some(asset) = result_rx.recv().await {
                assets.push(asset);
            }
            assets
        });

        let ports: Arc<[u16]> = Arc::from(ports);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let ports = Arc::clone(&ports);
            let params = self.params.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some(host) = next else {
                        break;
                    };

                    for &port in ports.iter() {
                        let asset = probe_port(&host, port, &params).await;
                        if !asset.state && params.keep_open_only {
                            continue;
                        }
                        if result_tx.send(asset).await.is_err() {
                            return;
                        }
                    }
                }
                trace!(worker_id, "scan worker finished");
            }));
        }
        drop(result_tx);

        for host in hosts {
            if work_tx.send(host.clone()).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "scan worker panicked");
            }
        }

        let assets = match aggregator.await {
            Ok(assets) => assets,
            Err(e) => {
                error!(error = %e, "scan aggregator failed");
                Vec::new()
            }
        };

        info!(found = assets.iter().filter(|a| a.state).count(), "scan completed");
        assets
    }
}

/// Try one TCP connection, then the optional service probe
async fn probe_port(host: &str, port: u16, params: &ScanParams) -> RemoteAsset {
    let connected = matches!(
        timeout(params.timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    );

    let state = match (&params.probe, connected) {
        (Some(probe), true) => {
            let ok = probe.probe(host, port).await;
            if !ok {
                debug!(host, port, probe = probe.name(), "port open but probe failed");
            }
            ok
        }
        _ => connected,
    };

    trace!(host, port, state, "probed");
    RemoteAsset::tcp(host, port, state)
}
