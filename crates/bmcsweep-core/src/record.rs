//! Inventory records handed to output files and the inventory service

use bmcsweep_redfish::{InventoryDetail, Manager};
use serde::{Deserialize, Serialize};

/// Endpoint type reported for every record
pub const RECORD_TYPE: &str = "NodeBMC";

/// Version of the record layout
pub const SCHEMA_VERSION: u32 = 1;

/// One BMC's collected inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryRecord {
    /// Stable inventory ID from the ID mapper
    #[serde(rename = "ID")]
    pub id: String,
    /// Endpoint type
    #[serde(rename = "Type")]
    pub kind: String,
    /// Display name
    pub name: String,
    /// Address the BMC was reached at
    #[serde(rename = "FQDN")]
    pub fqdn: String,
    /// Account used for the crawl
    pub user: String,
    /// Whether the inventory service must see a MAC for this endpoint
    #[serde(rename = "MACRequired")]
    pub mac_required: bool,
    /// Whether the service should re-discover on update
    pub rediscover_on_update: bool,
    /// Compute systems under the BMC
    pub systems: Vec<InventoryDetail>,
    /// Managers under the BMC
    pub managers: Vec<Manager>,
    /// Record layout version
    pub schema_version: u32,
    /// MAC of the manager interface the BMC was reached on
    #[serde(rename = "MACAddr", default, skip_serializing_if = "Option::is_none")]
    pub mac_addr: Option<String>,
}

impl InventoryRecord {
    /// Record for a crawled BMC; the MAC is filled in by [`correlate_mac`](Self::correlate_mac)
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        systems: Vec<InventoryDetail>,
        managers: Vec<Manager>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: RECORD_TYPE.to_string(),
            fqdn: host.into(),
            user: user.into(),
            mac_required: true,
            rediscover_on_update: true,
            systems,
            managers,
            schema_version: SCHEMA_VERSION,
            mac_addr: None,
        }
    }

    /// Set `mac_addr` from the manager interface whose IP is `host_ip`
    ///
    /// Returns `true` if a match was found; otherwise the field stays unset.
    pub fn correlate_mac(&mut self, host_ip: &str) -> bool {
        self.mac_addr = self
            .managers
            .iter()
            .find_map(|m| m.mac_for_ip(host_ip))
            .map(str::to_string);
        self.mac_addr.is_some()
    }
}
