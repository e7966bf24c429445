use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use bmcsweep_core::*;
use bmcsweep_redfish::{BmcCrawler, CrawlError, RedfishConnector, RedfishSession, SessionTarget};
use bmcsweep_scan::RemoteAsset;
use bmcsweep_secrets::{BmcCredentials, StaticSecretStore};

// Mock implementations
#[derive(Clone, Copy)]
enum Behaviour {
    Healthy,
    Empty,
    RejectCredentials,
    Slow,
}

#[derive(Default)]
struct Fleet {
    behaviour: HashMap<String, Behaviour>,
    connects: Mutex<HashMap<String, usize>>,
    logouts: AtomicUsize,
    seen_users: Mutex<Vec<String>>,
}

impl Fleet {
    fn with(hosts: &[(&str, Behaviour)]) -> Arc<Self> {
        Arc::new(Self {
            behaviour: hosts
                .iter()
                .map(|(h, b)| ((*h).to_string(), *b))
                .collect(),
            ..Fleet::default()
        })
    }

    fn connects(&self, host: &str) -> usize {
        self.connects.lock().unwrap().get(host).copied().unwrap_or(0)
    }
}

fn host_of(uri: &str) -> String {
    let rest = uri.trim_start_matches("https://");
    rest.split(':').next().unwrap_or(rest).to_string()
}

struct MockConnector(Arc<Fleet>);

#[async_trait]
impl RedfishConnector for MockConnector {
    async fn connect(
        &self,
        target: &SessionTarget,
    ) -> Result<Box<dyn RedfishSession>, CrawlError> {
        let host = host_of(&target.uri);
        *self
            .0
            .connects
            .lock()
            .unwrap()
            .entry(host.clone())
            .or_default() += 1;
        self.0
            .seen_users
            .lock()
            .unwrap()
            .push(target.credentials.username.clone());

        let behaviour = self
            .0
            .behaviour
            .get(&host)
            .copied()
            .ok_or_else(|| CrawlError::Transport(format!("connection refused: {host}")))?;

        if let Behaviour::RejectCredentials = behaviour {
            return Err(CrawlError::AuthenticationFailed(host));
        }

        Ok(Box::new(MockSession {
            fleet: Arc::clone(&self.0),
            host,
            behaviour,
        }))
    }
}

struct MockSession {
    fleet: Arc<Fleet>,
    host: String,
    behaviour: Behaviour,
}

impl MockSession {
    fn resource(&self, path: &str) -> Option<Value> {
        let empty = json!({ "Members": [] });
        let link = |p: &str| json!({ "@odata.id": p });

        if let Behaviour::Empty = self.behaviour {
            return match path {
                "/redfish/v1/Chassis" | "/redfish/v1/Systems" | "/redfish/v1/Managers" => {
                    Some(empty)
                }
                _ => None,
            };
        }

        Some(match path {
            "/redfish/v1/Chassis" => empty,
            "/redfish/v1/Systems" => json!({ "Members": [link("/redfish/v1/Systems/1")] }),
            "/redfish/v1/Systems/1" => json!({
                "UUID": format!("sys-{}", self.host),
                "PowerState": "On",
                "EthernetInterfaces": link("/redfish/v1/Systems/1/EthernetInterfaces")
            }),
            "/redfish/v1/Systems/1/EthernetInterfaces" => empty,
            "/redfish/v1/Managers" => json!({ "Members": [link("/redfish/v1/Managers/BMC")] }),
            "/redfish/v1/Managers/BMC" => json!({
                "ManagerType": "BMC",
                "EthernetInterfaces": link("/redfish/v1/Managers/BMC/EthernetInterfaces")
            }),
            "/redfish/v1/Managers/BMC/EthernetInterfaces" => {
                json!({ "Members": [link("/redfish/v1/Managers/BMC/EthernetInterfaces/1")] })
            }
            "/redfish/v1/Managers/BMC/EthernetInterfaces/1" => json!({
                "MACAddress": "EC:EB:B8:00:00:01",
                "IPv4Addresses": [{ "Address": self.host, "AddressOrigin": "Static" }]
            }),
            _ => return None,
        })
    }
}

#[async_trait]
impl RedfishSession for MockSession {
    async fn get(&self, path: &str) -> Result<Value, CrawlError> {
        if let Behaviour::Slow = self.behaviour {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.resource(path).ok_or_else(|| CrawlError::Http {
            status: 404,
            path: path.to_string(),
            message: String::new(),
        })
    }

    async fn logout(&self) -> Result<(), CrawlError> {
        self.fleet.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn collector(fleet: &Arc<Fleet>, mapper: Arc<dyn IdMapper>, concurrency: usize) -> Collector {
    Collector::new(
        BmcCrawler::new(Arc::new(MockConnector(Arc::clone(fleet)))),
        mapper,
        Arc::new(StaticSecretStore::new("root", "initial0")),
        CollectParams {
            concurrency,
            timeout: Duration::from_millis(300),
            ..CollectParams::default()
        },
    )
}

fn status_for<'a>(outcome: &'a CollectOutcome, host: &str) -> Vec<&'a HostOutcome> {
    outcome
        .statuses
        .iter()
        .filter(|s| s.host == host)
        .map(|s| &s.outcome)
        .collect()
}

#[tokio::test]
async fn test_partial_failures_are_isolated() {
    let fleet = Fleet::with(&[
        ("10.0.0.1", Behaviour::Healthy),
        ("10.0.0.2", Behaviour::RejectCredentials),
        ("10.0.0.3", Behaviour::Slow),
    ]);
    let collector = collector(&fleet, select_mapper(None), 0);

    let assets = vec![
        RemoteAsset::tcp("10.0.0.1", 443, true),
        RemoteAsset::tcp("10.0.0.2", 443, true),
        RemoteAsset::tcp("10.0.0.3", 443, true),
        RemoteAsset::tcp("10.0.0.4", 443, false),
    ];
    let outcome = collector.collect(&assets).await;

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.id, "x320c0s0b1");
    assert_eq!(record.fqdn, "10.0.0.1");
    assert_eq!(record.user, "root");
    assert_eq!(record.systems.len(), 1);
    assert_eq!(record.mac_addr.as_deref(), Some("ec:eb:b8:00:00:01"));

    assert_eq!(outcome.statuses.len(), 3, "closed endpoints are not considered");
    assert!(matches!(
        status_for(&outcome, "10.0.0.2").as_slice(),
        [HostOutcome::Failed(e)] if e.is_auth_failure()
    ));
    assert!(matches!(
        status_for(&outcome, "10.0.0.3").as_slice(),
        [HostOutcome::Failed(CollectError::Crawl(CrawlError::Timeout(_)))]
    ));
    assert_eq!(outcome.failures().count(), 2);

    // the failed systems crawl stops the host before managers are crawled
    assert_eq!(fleet.connects("10.0.0.2"), 1);
    assert_eq!(fleet.connects("10.0.0.4"), 0);
}

#[tokio::test]
async fn test_unmapped_hosts_are_never_crawled() {
    let fleet = Fleet::with(&[
        ("10.0.0.1", Behaviour::Healthy),
        ("10.0.0.2", Behaviour::Healthy),
    ]);
    let map = BmcIdMap::parse(r#"{"id_map": {"10.0.0.1": "x3000c0s1b0"}}"#).unwrap();
    let collector = collector(&fleet, select_mapper(Some(map)), 2);

    let outcome = collector
        .collect(&[
            RemoteAsset::tcp("10.0.0.1", 443, true),
            RemoteAsset::tcp("10.0.0.2", 443, true),
            RemoteAsset::tcp("bmc.example", 443, true),
        ])
        .await;

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["x3000c0s1b0"]);
    assert!(matches!(
        status_for(&outcome, "10.0.0.2").as_slice(),
        [HostOutcome::Skipped(_)]
    ));
    assert_eq!(fleet.connects("10.0.0.2"), 0);
    assert_eq!(fleet.connects("bmc.example"), 0);
}

#[tokio::test]
async fn test_host_collected_once_across_ports() {
    let fleet = Fleet::with(&[("10.0.0.1", Behaviour::Healthy)]);
    let collector = collector(&fleet, select_mapper(None), 5);

    let assets: Vec<RemoteAsset> = [443, 8443, 8080, 5000, 9443]
        .into_iter()
        .map(|port| RemoteAsset::tcp("10.0.0.1", port, true))
        .collect();
    let outcome = collector.collect(&assets).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.statuses.len(), 5);
    let skipped = outcome
        .statuses
        .iter()
        .filter(|s| matches!(s.outcome, HostOutcome::Skipped(_)))
        .count();
    assert_eq!(skipped, 4);

    // one systems crawl plus one managers crawl
    assert_eq!(fleet.connects("10.0.0.1"), 2);
    assert_eq!(fleet.logouts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_bmc_is_skipped_and_retried_on_next_port() {
    let fleet = Fleet::with(&[("10.0.0.9", Behaviour::Empty)]);
    let collector = collector(&fleet, select_mapper(None), 1);

    let outcome = collector
        .collect(&[
            RemoteAsset::tcp("10.0.0.9", 443, true),
            RemoteAsset::tcp("10.0.0.9", 8443, true),
        ])
        .await;

    assert!(outcome.records.is_empty());
    assert!(
        outcome
            .statuses
            .iter()
            .all(|s| matches!(s.outcome, HostOutcome::Skipped(_)))
    );
    assert_eq!(fleet.connects("10.0.0.9"), 4);
}

#[tokio::test]
async fn test_explicit_credentials_reach_the_bmc() {
    let fleet = Fleet::with(&[("10.0.0.1", Behaviour::Healthy)]);
    let collector = Collector::new(
        BmcCrawler::new(Arc::new(MockConnector(Arc::clone(&fleet)))),
        select_mapper(None),
        Arc::new(StaticSecretStore::new("root", "initial0")),
        CollectParams {
            credentials: Some(BmcCredentials::new("admin", "pw")),
            ..CollectParams::default()
        },
    );

    let outcome = collector
        .collect(&[RemoteAsset::tcp("10.0.0.1", 443, true)])
        .await;

    assert_eq!(outcome.records[0].user, "admin");
    assert!(fleet.seen_users.lock().unwrap().iter().all(|u| u == "admin"));
}
