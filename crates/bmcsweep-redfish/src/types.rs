//! Normalized inventory types produced by the crawler

use serde::{Deserialize, Serialize};

/// Network interface seen through Redfish
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EthernetInterface {
    /// Redfish resource path
    pub uri: String,
    /// MAC address
    pub mac: String,
    /// First usable IPv4 address
    pub ip: String,
    /// Interface name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Whether the interface is enabled
    pub enabled: bool,
}

/// Trusted platform module reported by a system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustedModule {
    /// Module interface (`TPM2_0`, ...)
    pub interface_type: String,
    /// Firmware version
    pub firmware_version: String,
    /// Enabled state
    pub state: String,
}

/// Attributes of a chassis, copied onto each system it contains
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChassisAttributes {
    /// Stock keeping unit
    pub sku: String,
    /// Serial number
    pub serial: String,
    /// Asset tag
    pub asset_tag: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Model
    pub model: String,
}

/// One compute system under a BMC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDetail {
    /// Redfish resource path
    pub uri: String,
    /// System UUID
    pub uuid: String,
    /// System name
    pub name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// System type (`Physical`, `Virtual`, ...)
    pub system_type: String,
    /// Model
    pub model: String,
    /// Serial number
    pub serial: String,
    /// BIOS version
    pub bios_version: String,
    /// Power state (`On`, `Off`, ...)
    pub power_state: String,
    /// Number of processors
    pub processor_count: u32,
    /// Processor model
    pub processor_type: String,
    /// Total memory in GiB
    pub memory_total: f64,
    /// Network interfaces of the system
    pub ethernet_interfaces: Vec<EthernetInterface>,
    /// Trusted modules
    pub trusted_modules: Vec<TrustedModule>,
    /// Chassis SKU
    pub chassis_sku: String,
    /// Chassis serial number
    pub chassis_serial: String,
    /// Chassis asset tag
    pub chassis_asset_tag: String,
    /// Chassis manufacturer
    pub chassis_manufacturer: String,
    /// Chassis model
    pub chassis_model: String,
}

impl InventoryDetail {
    /// Copy chassis attributes onto this system
    pub fn apply_chassis(&mut self, chassis: &ChassisAttributes) {
        self.chassis_sku.clone_from(&chassis.sku);
        self.chassis_serial.clone_from(&chassis.serial);
        self.chassis_asset_tag.clone_from(&chassis.asset_tag);
        self.chassis_manufacturer.clone_from(&chassis.manufacturer);
        self.chassis_model.clone_from(&chassis.model);
    }
}

/// One Redfish manager (the BMC itself) under a service root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manager {
    /// Redfish resource path
    pub uri: String,
    /// Manager UUID
    pub uuid: String,
    /// Manager name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Model
    pub model: String,
    /// Manager type (`BMC`, `EnclosureManager`, ...)
    pub manager_type: String,
    /// Firmware version
    pub firmware_version: String,
    /// Network interfaces of the manager
    pub ethernet_interfaces: Vec<EthernetInterface>,
}

impl Manager {
    /// MAC of the interface whose IPv4 address is `ip`
    #[must_use]
    pub fn mac_for_ip(&self, ip: &str) -> Option<&str> {
        self.ethernet_interfaces
            .iter()
            .find(|iface| !iface.mac.is_empty() && iface.ip == ip)
            .map(|iface| iface.mac.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_chassis() {
        let mut system = InventoryDetail::default();
        system.apply_chassis(&ChassisAttributes {
            sku: "SKU1".into(),
            serial: "CS1".into(),
            asset_tag: "tag".into(),
            manufacturer: "HPE".into(),
            model: "XL675d".into(),
        });
        assert_eq!(system.chassis_sku, "SKU1");
        assert_eq!(system.chassis_model, "XL675d");
    }

    #[test]
    fn test_mac_for_ip() {
        let manager = Manager {
            ethernet_interfaces: vec![
                EthernetInterface {
                    mac: "aa:bb".into(),
                    ip: "10.0.0.9".into(),
                    ..EthernetInterface::default()
                },
                EthernetInterface {
                    mac: "cc:dd".into(),
                    ip: "10.0.0.5".into(),
                    ..EthernetInterface::default()
                },
            ],
            ..Manager::default()
        };
        assert_eq!(manager.mac_for_ip("10.0.0.5"), Some("cc:dd"));
        assert_eq!(manager.mac_for_ip("10.0.0.6"), None);
    }
}
