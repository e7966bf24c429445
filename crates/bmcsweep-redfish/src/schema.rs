//! Redfish resource shapes as returned by BMCs
//!
//! Firmware is inconsistent about which properties exist and whether they are
//! `null`, so every property is optional.

use serde::Deserialize;

use crate::types::{ChassisAttributes, EthernetInterface, InventoryDetail, Manager, TrustedModule};

/// Well-known resource paths
pub mod paths {
    /// Service root
    pub const SERVICE_ROOT: &str = "/redfish/v1/";
    /// Session collection, when the service root does not link one
    pub const SESSIONS: &str = "/redfish/v1/SessionService/Sessions";
    /// Chassis collection
    pub const CHASSIS: &str = "/redfish/v1/Chassis";
    /// Systems collection
    pub const SYSTEMS: &str = "/redfish/v1/Systems";
    /// Managers collection
    pub const MANAGERS: &str = "/redfish/v1/Managers";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ODataLink {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,
}

impl ODataLink {
    pub fn path(&self) -> Option<&str> {
        self.odata_id.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Collection {
    pub members: Option<Vec<ODataLink>>,
}

impl Collection {
    pub fn member_paths(&self) -> Vec<String> {
        self.members
            .iter()
            .flatten()
            .filter_map(|m| m.path().map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ServiceRootLinks {
    pub sessions: Option<ODataLink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ServiceRoot {
    pub links: Option<ServiceRootLinks>,
}

impl ServiceRoot {
    pub fn sessions_path(&self) -> String {
        self.links
            .as_ref()
            .and_then(|l| l.sessions.as_ref())
            .and_then(ODataLink::path)
            .unwrap_or(paths::SESSIONS)
            .to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ChassisLinks {
    pub computer_systems: Option<Vec<ODataLink>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Chassis {
    #[serde(rename = "SKU")]
    pub sku: Option<String>,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub links: Option<ChassisLinks>,
}

impl Chassis {
    pub fn system_paths(&self) -> Vec<String> {
        self.links
            .iter()
            .filter_map(|l| l.computer_systems.as_ref())
            .flatten()
            .filter_map(|m| m.path().map(str::to_string))
            .collect()
    }

    pub fn attributes(&self) -> ChassisAttributes {
        ChassisAttributes {
            sku: self.sku.clone().unwrap_or_default(),
            serial: self.serial_number.clone().unwrap_or_default(),
            asset_tag: self.asset_tag.clone().unwrap_or_default(),
            manufacturer: self.manufacturer.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ProcessorSummary {
    pub count: Option<u32>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct MemorySummary {
    #[serde(rename = "TotalSystemMemoryGiB")]
    pub total_system_memory_gib: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Status {
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct TrustedModuleEntry {
    pub interface_type: Option<String>,
    pub firmware_version: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct SystemLinks {
    pub chassis: Option<Vec<ODataLink>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ComputerSystem {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub system_type: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub bios_version: Option<String>,
    pub power_state: Option<String>,
    pub processor_summary: Option<ProcessorSummary>,
    pub memory_summary: Option<MemorySummary>,
    pub trusted_modules: Option<Vec<TrustedModuleEntry>>,
    pub ethernet_interfaces: Option<ODataLink>,
    pub links: Option<SystemLinks>,
}

impl ComputerSystem {
    pub fn interfaces_path(&self) -> Option<&str> {
        self.ethernet_interfaces.as_ref().and_then(ODataLink::path)
    }

    pub fn first_chassis_path(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.chassis.as_ref())
            .and_then(|c| c.iter().find_map(ODataLink::path))
    }

    /// Identity and capacity fields; interfaces and chassis are filled in by the walker
    pub fn to_detail(&self, uri: &str) -> InventoryDetail {
        let processors = self.processor_summary.as_ref();
        InventoryDetail {
            uri: uri.to_string(),
            uuid: self.uuid.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            manufacturer: self.manufacturer.clone().unwrap_or_default(),
            system_type: self.system_type.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
            serial: self.serial_number.clone().unwrap_or_default(),
            bios_version: self.bios_version.clone().unwrap_or_default(),
            power_state: self.power_state.clone().unwrap_or_default(),
            processor_count: processors.and_then(|p| p.count).unwrap_or(0),
            processor_type: processors.and_then(|p| p.model.clone()).unwrap_or_default(),
            memory_total: self
                .memory_summary
                .as_ref()
                .and_then(|m| m.total_system_memory_gib)
                .unwrap_or(0.0),
            trusted_modules: self
                .trusted_modules
                .iter()
                .flatten()
                .map(|t| TrustedModule {
                    interface_type: t.interface_type.clone().unwrap_or_default(),
                    firmware_version: t.firmware_version.clone().unwrap_or_default(),
                    state: t
                        .status
                        .as_ref()
                        .and_then(|s| s.state.clone())
                        .unwrap_or_default(),
                })
                .collect(),
            ..InventoryDetail::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ManagerResource {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub model: Option<String>,
    pub manager_type: Option<String>,
    pub firmware_version: Option<String>,
    pub ethernet_interfaces: Option<ODataLink>,
}

impl ManagerResource {
    pub fn interfaces_path(&self) -> Option<&str> {
        self.ethernet_interfaces.as_ref().and_then(ODataLink::path)
    }

    pub fn to_manager(&self, uri: &str) -> Manager {
        Manager {
            uri: uri.to_string(),
            uuid: self.uuid.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
            manager_type: self.manager_type.clone().unwrap_or_default(),
            firmware_version: self.firmware_version.clone().unwrap_or_default(),
            ethernet_interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Ipv4Address {
    pub address: Option<String>,
    pub address_origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct EthernetInterfaceResource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "MACAddress")]
    pub mac_address: Option<String>,
    #[serde(rename = "PermanentMACAddress")]
    pub permanent_mac_address: Option<String>,
    pub interface_enabled: Option<bool>,
    #[serde(rename = "IPv4Addresses")]
    pub ipv4_addresses: Option<Vec<Ipv4Address>>,
}

impl EthernetInterfaceResource {
    /// First DHCP or static address, else the first non-empty one
    pub fn first_ipv4(&self) -> Option<String> {
        let usable: Vec<&Ipv4Address> = self
            .ipv4_addresses
            .iter()
            .flatten()
            .filter(|a| {
                a.address
                    .as_deref()
                    .is_some_and(|ip| !ip.is_empty() && ip != "0.0.0.0")
            })
            .collect();

        usable
            .iter()
            .find(|a| {
                a.address_origin
                    .as_deref()
                    .is_some_and(|o| o.eq_ignore_ascii_case("dhcp") || o.eq_ignore_ascii_case("static"))
            })
            .or_else(|| usable.first())
            .and_then(|a| a.address.clone())
    }

    pub fn to_interface(&self, uri: &str) -> EthernetInterface {
        let mac = self
            .mac_address
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| self.permanent_mac_address.clone())
            .unwrap_or_default();

        EthernetInterface {
            uri: uri.to_string(),
            mac: mac.to_lowercase(),
            ip: self.first_ipv4().unwrap_or_default(),
            name: self
                .name
                .clone()
                .or_else(|| self.id.clone())
                .unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            enabled: self.interface_enabled.unwrap_or(true),
        }
    }
}
