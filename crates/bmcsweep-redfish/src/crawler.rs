//! BMC crawler
//!
//! Opens one Redfish session per call, walks the resource tree and always
//! logs the session out again. Errors that make the host unusable (not a BMC,
//! rejected credentials, transport failure, timeout) abort the crawl; a
//! failing sub-resource is logged and skipped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bmcsweep_secrets::{BmcCredentials, SecretStore};
use serde::de::DeserializeOwned;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::client::{HttpConnector, RedfishConnector, RedfishSession, SessionTarget};
use crate::credentials::resolve_credentials;
use crate::error::{CrawlError, Result};
use crate::schema::{
    Chassis, Collection, ComputerSystem, EthernetInterfaceResource, ManagerResource, paths,
};
use crate::types::{ChassisAttributes, EthernetInterface, InventoryDetail, Manager};

/// Default whole-crawl time budget
pub const DEFAULT_CRAWL_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the logout request after the crawl budget is spent
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to crawl one BMC
#[derive(Clone)]
pub struct CrawlerConfig {
    /// Base URI of the BMC
    pub uri: String,
    /// Shared credential store
    pub credential_store: Arc<dyn SecretStore>,
    /// Skip TLS certificate validation
    pub insecure: bool,
    /// Fall back to the `"default"` secret
    pub use_default: bool,
    /// Credentials that override the store
    pub credentials: Option<BmcCredentials>,
    /// Whole-crawl time budget
    pub timeout: Duration,
}

impl CrawlerConfig {
    /// Config for `uri` backed by `credential_store`
    pub fn new(uri: impl Into<String>, credential_store: Arc<dyn SecretStore>) -> Self {
        Self {
            uri: uri.into(),
            credential_store,
            insecure: false,
            use_default: true,
            credentials: None,
            timeout: DEFAULT_CRAWL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    #[must_use]
    pub fn with_use_default(mut self, use_default: bool) -> Self {
        self.use_default = use_default;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: BmcCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for CrawlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerConfig")
            .field("uri", &self.uri)
            .field("credential_store", &self.credential_store.store_type())
            .field("insecure", &self.insecure)
            .field("use_default", &self.use_default)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Crawls BMCs through a [`RedfishConnector`]
#[derive(Clone)]
pub struct BmcCrawler {
    connector: Arc<dyn RedfishConnector>,
}

impl std::fmt::Debug for BmcCrawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BmcCrawler").finish_non_exhaustive()
    }
}

impl Default for BmcCrawler {
    fn default() -> Self {
        Self::http()
    }
}

impl BmcCrawler {
    /// Crawler using a custom connector
    pub fn new(connector: Arc<dyn RedfishConnector>) -> Self {
        Self { connector }
    }

    /// Crawler speaking HTTPS via reqwest
    #[must_use]
    pub fn http() -> Self {
        Self::new(Arc::new(HttpConnector::new()))
    }

    /// Collect every compute system under the BMC
    ///
    /// # Errors
    /// Returns the first host-level failure; see [`CrawlError::aborts_host`].
    #[instrument(skip_all, fields(uri = %config.uri))]
    pub async fn crawl_systems(&self, config: &CrawlerConfig) -> Result<Vec<InventoryDetail>> {
        let deadline = Instant::now() + config.timeout;
        let session = self.open(config, deadline).await?;

        let result = timeout_at(deadline, walk_systems(session.as_ref()))
            .await
            .unwrap_or(Err(CrawlError::Timeout(config.timeout)));
        close(session.as_ref(), &config.uri).await;

        let systems = result?;
        info!(count = systems.len(), "crawled systems");
        Ok(systems)
    }

    /// Collect every manager under the BMC
    ///
    /// # Errors
    /// Returns the first host-level failure; see [`CrawlError::aborts_host`].
    #[instrument(skip_all, fields(uri = %config.uri))]
    pub async fn crawl_managers(&self, config: &CrawlerConfig) -> Result<Vec<Manager>> {
        let deadline = Instant::now() + config.timeout;
        let session = self.open(config, deadline).await?;

        let result = timeout_at(deadline, walk_managers(session.as_ref()))
            .await
            .unwrap_or(Err(CrawlError::Timeout(config.timeout)));
        close(session.as_ref(), &config.uri).await;

        let managers = result?;
        info!(count = managers.len(), "crawled managers");
        Ok(managers)
    }

    async fn open(
        &self,
        config: &CrawlerConfig,
        deadline: Instant,
    ) -> Result<Box<dyn RedfishSession>> {
        let (credentials, source) = resolve_credentials(config);
        debug!(%source, username = %credentials.username, "opening session");

        let target = SessionTarget {
            uri: config.uri.clone(),
            credentials,
            insecure: config.insecure,
            timeout: config.timeout,
        };

        timeout_at(deadline, self.connector.connect(&target))
            .await
            .map_err(|_| CrawlError::Timeout(config.timeout))?
    }
}

async fn close(session: &dyn RedfishSession, uri: &str) {
    match timeout(LOGOUT_TIMEOUT, session.logout()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(uri, error = %e, "failed to log out of Redfish session"),
        Err(_) => warn!(uri, "timed out logging out of Redfish session"),
    }
}

async fn fetch<T: DeserializeOwned>(session: &dyn RedfishSession, path: &str) -> Result<T> {
    let value = session.get(path).await?;
    serde_json::from_value(value).map_err(|e| CrawlError::InvalidResponse {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Propagate host-level failures, log and drop the rest
fn absorb<T>(result: Result<T>, path: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.aborts_host() => Err(e),
        Err(e) => {
            warn!(path, error = %e, "skipping unreadable resource");
            Ok(None)
        }
    }
}

async fn walk_systems(session: &dyn RedfishSession) -> Result<Vec<InventoryDetail>> {
    let mut systems = Vec::new();
    let mut seen = HashSet::new();
    let mut chassis_attrs: HashMap<String, ChassisAttributes> = HashMap::new();

    let chassis_paths = absorb(fetch::<Collection>(session, paths::CHASSIS).await, paths::CHASSIS)?
        .map(|c| c.member_paths())
        .unwrap_or_default();

    for chassis_path in chassis_paths {
        let Some(chassis) = absorb(fetch::<Chassis>(session, &chassis_path).await, &chassis_path)?
        else {
            continue;
        };
        let attrs = chassis.attributes();

        for system_path in chassis.system_paths() {
            if !seen.insert(system_path.clone()) {
                continue;
            }
            let read = read_system(session, &system_path, Some(&attrs), &mut chassis_attrs).await;
            if let Some(detail) = absorb(read, &system_path)? {
                systems.push(detail);
            }
        }
        chassis_attrs.insert(chassis_path, attrs);
    }

    let system_paths = absorb(fetch::<Collection>(session, paths::SYSTEMS).await, paths::SYSTEMS)?
        .map(|c| c.member_paths())
        .unwrap_or_default();

    for system_path in system_paths {
        if !seen.insert(system_path.clone()) {
            continue;
        }
        let read = read_system(session, &system_path, None, &mut chassis_attrs).await;
        if let Some(detail) = absorb(read, &system_path)? {
            systems.push(detail);
        }
    }

    Ok(systems)
}

async fn read_system(
    session: &dyn RedfishSession,
    path: &str,
    chassis: Option<&ChassisAttributes>,
    known_chassis: &mut HashMap<String, ChassisAttributes>,
) -> Result<InventoryDetail> {
    let system: ComputerSystem = fetch(session, path).await?;
    let mut detail = system.to_detail(path);

    match chassis {
        Some(attrs) => detail.apply_chassis(attrs),
        None => {
            if let Some(chassis_path) = system.first_chassis_path() {
                if !known_chassis.contains_key(chassis_path) {
                    let fetched = fetch::<Chassis>(session, chassis_path).await;
                    if let Some(c) = absorb(fetched, chassis_path)? {
                        known_chassis.insert(chassis_path.to_string(), c.attributes());
                    }
                }
                if let Some(attrs) = known_chassis.get(chassis_path) {
                    detail.apply_chassis(attrs);
                }
            }
        }
    }

    detail.ethernet_interfaces = read_interfaces(session, system.interfaces_path()).await?;
    debug!(path, interfaces = detail.ethernet_interfaces.len(), "read system");
    Ok(detail)
}

async fn read_interfaces(
    session: &dyn RedfishSession,
    collection_path: Option<&str>,
) -> Result<Vec<EthernetInterface>> {
    let Some(collection_path) = collection_path else {
        return Ok(Vec::new());
    };
    let Some(collection) = absorb(
        fetch::<Collection>(session, collection_path).await,
        collection_path,
    )?
    else {
        return Ok(Vec::new());
    };

    let mut interfaces = Vec::new();
    for path in collection.member_paths() {
        let fetched = fetch::<EthernetInterfaceResource>(session, &path).await;
        if let Some(iface) = absorb(fetched, &path)? {
            interfaces.push(iface.to_interface(&path));
        }
    }
    Ok(interfaces)
}

async fn walk_managers(session: &dyn RedfishSession) -> Result<Vec<Manager>> {
    let manager_paths = fetch::<Collection>(session, paths::MANAGERS)
        .await?
        .member_paths();

    let mut managers = Vec::new();
    for path in manager_paths {
        let fetched = fetch::<ManagerResource>(session, &path).await;
        let Some(resource) = absorb(fetched, &path)? else {
            continue;
        };
        let mut manager = resource.to_manager(&path);
        manager.ethernet_interfaces = read_interfaces(session, resource.interfaces_path()).await?;
        managers.push(manager);
    }
    Ok(managers)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bmcsweep_secrets::StaticSecretStore;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default)]
    struct MockState {
        resources: HashMap<String, Value>,
        failures: HashMap<String, CrawlError>,
        connect_error: Option<CrawlError>,
        delay: Option<Duration>,
        logouts: AtomicUsize,
        gets: AtomicUsize,
    }

    #[derive(Clone)]
    struct MockConnector(Arc<MockState>);

    struct MockSession(Arc<MockState>);

    #[async_trait]
    impl RedfishConnector for MockConnector {
        async fn connect(&self, _target: &SessionTarget) -> Result<Box<dyn RedfishSession>> {
            if let Some(e) = &self.0.connect_error {
                return Err(e.clone());
            }
            Ok(Box::new(MockSession(self.0.clone())))
        }
    }

    #[async_trait]
    impl RedfishSession for MockSession {
        async fn get(&self, path: &str) -> Result<Value> {
            self.0.gets.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.0.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(e) = self.0.failures.get(path) {
                return Err(e.clone());
            }
            self.0
                .resources
                .get(path)
                .cloned()
                .ok_or_else(|| CrawlError::Http {
                    status: 404,
                    path: path.to_string(),
                    message: String::new(),
                })
        }

        async fn logout(&self) -> Result<()> {
            self.0.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn link(path: &str) -> Value {
        json!({ "@odata.id": path })
    }

    fn bmc_tree() -> HashMap<String, Value> {
        let mut r = HashMap::new();
        r.insert(
            paths::CHASSIS.to_string(),
            json!({ "Members": [link("/redfish/v1/Chassis/1")] }),
        );
        r.insert(
            "/redfish/v1/Chassis/1".to_string(),
            json!({
                "SKU": "SKU-1",
                "SerialNumber": "CH-1",
                "Manufacturer": "HPE",
                "Model": "Apollo",
                "Links": { "ComputerSystems": [link("/redfish/v1/Systems/1")] }
            }),
        );
        r.insert(
            "/redfish/v1/Chassis/2".to_string(),
            json!({ "SKU": "SKU-2", "SerialNumber": "CH-2" }),
        );
        r.insert(
            paths::SYSTEMS.to_string(),
            json!({ "Members": [link("/redfish/v1/Systems/1"), link("/redfish/v1/Systems/2")] }),
        );
        r.insert(
            "/redfish/v1/Systems/1".to_string(),
            json!({
                "UUID": "uuid-1",
                "Name": "node1",
                "SerialNumber": "SYS-1",
                "PowerState": "On",
                "ProcessorSummary": { "Count": 2, "Model": "EPYC 7763" },
                "MemorySummary": { "TotalSystemMemoryGiB": 512.0 },
                "EthernetInterfaces": link("/redfish/v1/Systems/1/EthernetInterfaces")
            }),
        );
        r.insert(
            "/redfish/v1/Systems/1/EthernetInterfaces".to_string(),
            json!({ "Members": [
                link("/redfish/v1/Systems/1/EthernetInterfaces/1"),
                link("/redfish/v1/Systems/1/EthernetInterfaces/2")
            ] }),
        );
        r.insert(
            "/redfish/v1/Systems/1/EthernetInterfaces/1".to_string(),
            json!({
                "Id": "1",
                "MACAddress": "B4:2E:99:00:00:01",
                "IPv4Addresses": [{ "Address": "10.1.0.11", "AddressOrigin": "DHCP" }]
            }),
        );
        r.insert(
            "/redfish/v1/Systems/2".to_string(),
            json!({
                "UUID": "uuid-2",
                "Links": { "Chassis": [link("/redfish/v1/Chassis/2")] }
            }),
        );
        r.insert(
            paths::MANAGERS.to_string(),
            json!({ "Members": [link("/redfish/v1/Managers/1")] }),
        );
        r.insert(
            "/redfish/v1/Managers/1".to_string(),
            json!({
                "UUID": "mgr-uuid",
                "ManagerType": "BMC",
                "FirmwareVersion": "2.80",
                "EthernetInterfaces": link("/redfish/v1/Managers/1/EthernetInterfaces")
            }),
        );
        r.insert(
            "/redfish/v1/Managers/1/EthernetInterfaces".to_string(),
            json!({ "Members": [link("/redfish/v1/Managers/1/EthernetInterfaces/1")] }),
        );
        r.insert(
            "/redfish/v1/Managers/1/EthernetInterfaces/1".to_string(),
            json!({
                "MACAddress": "94:40:C9:00:00:AA",
                "IPv4Addresses": [{ "Address": "10.254.1.5", "AddressOrigin": "Static" }]
            }),
        );
        r
    }

    fn crawler(state: MockState) -> (BmcCrawler, Arc<MockState>) {
        let state = Arc::new(state);
        (
            BmcCrawler::new(Arc::new(MockConnector(state.clone()))),
            state,
        )
    }

    fn config() -> CrawlerConfig {
        CrawlerConfig::new(
            "https://10.254.1.5",
            Arc::new(StaticSecretStore::new("root", "pw")),
        )
    }

    #[tokio::test]
    async fn test_crawl_systems_walks_chassis_then_systems() {
        let (crawler, state) = crawler(MockState {
            resources: bmc_tree(),
            ..MockState::default()
        });

        let systems = crawler.crawl_systems(&config()).await.unwrap();
        assert_eq!(systems.len(), 2, "Systems/1 is linked twice but reported once");

        let node1 = &systems[0];
        assert_eq!(node1.uri, "/redfish/v1/Systems/1");
        assert_eq!(node1.chassis_sku, "SKU-1");
        assert_eq!(node1.chassis_serial, "CH-1");
        assert_eq!(node1.processor_count, 2);
        assert!((node1.memory_total - 512.0).abs() < f64::EPSILON);
        // interface 2 is missing and skipped
        assert_eq!(node1.ethernet_interfaces.len(), 1);
        assert_eq!(node1.ethernet_interfaces[0].mac, "b4:2e:99:00:00:01");
        assert_eq!(node1.ethernet_interfaces[0].ip, "10.1.0.11");

        let node2 = &systems[1];
        assert_eq!(node2.uuid, "uuid-2");
        assert_eq!(node2.chassis_sku, "SKU-2", "top-level system takes its linked chassis");
        assert!(node2.ethernet_interfaces.is_empty());

        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_crawl_managers() {
        let (crawler, state) = crawler(MockState {
            resources: bmc_tree(),
            ..MockState::default()
        });

        let managers = crawler.crawl_managers(&config()).await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].manager_type, "BMC");
        assert_eq!(managers[0].mac_for_ip("10.254.1.5"), Some("94:40:c9:00:00:aa"));
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_mid_walk_aborts_and_logs_out() {
        let mut failures = HashMap::new();
        failures.insert(
            "/redfish/v1/Systems/2".to_string(),
            CrawlError::AuthenticationFailed("session expired".into()),
        );
        let (crawler, state) = crawler(MockState {
            resources: bmc_tree(),
            failures,
            ..MockState::default()
        });

        let err = crawler.crawl_systems(&config()).await.unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sub_resource_http_error_is_absorbed() {
        let mut failures = HashMap::new();
        failures.insert(
            "/redfish/v1/Chassis/1".to_string(),
            CrawlError::Http {
                status: 500,
                path: "/redfish/v1/Chassis/1".into(),
                message: "internal".into(),
            },
        );
        let (crawler, _state) = crawler(MockState {
            resources: bmc_tree(),
            failures,
            ..MockState::default()
        });

        let systems = crawler.crawl_systems(&config()).await.unwrap();
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].uri, "/redfish/v1/Systems/1");
        assert_eq!(systems[0].chassis_sku, "", "chassis could not be read");
    }

    #[tokio::test]
    async fn test_systems_under_chassis_survive_missing_systems_collection() {
        let mut resources = bmc_tree();
        resources.remove(paths::SYSTEMS);
        let (crawler, state) = crawler(MockState {
            resources,
            ..MockState::default()
        });

        let systems = crawler.crawl_systems(&config()).await.unwrap();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].uri, "/redfish/v1/Systems/1");
        assert_eq!(systems[0].chassis_sku, "SKU-1");
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_a_bmc_skips_logout() {
        let (crawler, state) = crawler(MockState {
            connect_error: Some(CrawlError::NotABmc("https://10.254.1.5".into())),
            ..MockState::default()
        });

        let err = crawler.crawl_systems(&config()).await.unwrap_err();
        assert!(matches!(err, CrawlError::NotABmc(_)));
        assert_eq!(state.gets.load(Ordering::SeqCst), 0);
        assert_eq!(state.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_covers_whole_crawl() {
        let (crawler, state) = crawler(MockState {
            resources: bmc_tree(),
            delay: Some(Duration::from_millis(200)),
            ..MockState::default()
        });

        let config = config().with_timeout(Duration::from_millis(300));
        let err = crawler.crawl_systems(&config).await.unwrap_err();
        assert!(matches!(err, CrawlError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_debug_masks_password() {
        let rendered = format!(
            "{:?}",
            config().with_credentials(BmcCredentials::new("admin", "hunter2"))
        );
        assert!(rendered.contains("static"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
