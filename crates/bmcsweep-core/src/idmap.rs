//! Stable inventory IDs for BMCs
//!
//! Either generated from the BMC's IPv4 address (XNAME layout) or looked up in
//! an operator-supplied map.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IdMapError, IdMapResult};

/// Which lookup key a user ID map is indexed by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MapKey {
    /// BMC IP address
    #[default]
    #[serde(rename = "bmc-ip-addr")]
    BmcIpAddr,
}

impl MapKey {
    /// Wire name of the key
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MapKey::BmcIpAddr => "bmc-ip-addr",
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapKey {
    type Err = IdMapError;

    fn from_str(s: &str) -> IdMapResult<Self> {
        match s {
            "bmc-ip-addr" => Ok(MapKey::BmcIpAddr),
            other => Err(IdMapError::UnknownMapKey(other.to_string())),
        }
    }
}

/// Operator-supplied ID map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BmcIdMap {
    /// Lookup value to inventory ID
    pub id_map: HashMap<String, String>,
    /// What the keys of `id_map` are
    pub map_key: MapKey,
}

#[derive(Deserialize)]
struct RawIdMap {
    #[serde(default)]
    id_map: HashMap<String, String>,
    #[serde(default)]
    map_key: Option<String>,
}

impl BmcIdMap {
    /// Parse a JSON or YAML document
    ///
    /// # Errors
    /// Returns `IdMapError::Parse` for malformed documents and
    /// `IdMapError::UnknownMapKey` for an unsupported `map_key`.
    pub fn parse(text: &str) -> IdMapResult<Self> {
        let raw: RawIdMap = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| {
                IdMapError::Parse(format!("not JSON ({json_err}) or YAML ({yaml_err})"))
            })?,
        };

        let map_key = match raw.map_key.as_deref() {
            Some(key) => key.parse()?,
            None => MapKey::default(),
        };

        Ok(Self {
            id_map: raw.id_map,
            map_key,
        })
    }

    /// Load from inline text, or from a file when `source` starts with `@`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the document is invalid.
    pub fn from_source(source: &str) -> IdMapResult<Self> {
        match source.strip_prefix('@') {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| IdMapError::Io {
                    path: path.into(),
                    source,
                })?;
                debug!(path, "loaded ID map file");
                Self::parse(&text)
            }
            None => Self::parse(source),
        }
    }
}

/// Values an ID can be looked up by
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupKeys {
    /// BMC IP address (or hostname when that is all the scan saw)
    pub bmc_ip_addr: String,
}

impl LookupKeys {
    /// Keys for a scanned host
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            bmc_ip_addr: host.into(),
        }
    }
}

/// Maps a BMC to its stable inventory ID
pub trait IdMapper: Send + Sync {
    /// Inventory ID for the BMC, or `None` if it should be skipped
    fn mapped_id(&self, keys: &LookupKeys) -> Option<String>;

    /// Short mapper name for logging
    fn name(&self) -> &'static str;
}

/// Derives `x{cabinet}c{chassis}s{slot}b{bmc}` from the BMC's IPv4 address
///
/// The address is read as a big-endian `u32`: cabinet is bits 19-31, chassis
/// bits 16-18, slot bits 8-15 and BMC bits 0-7.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratedXnameMapper;

impl GeneratedXnameMapper {
    /// XNAME for an IPv4 address
    #[must_use]
    pub fn xname(addr: Ipv4Addr) -> String {
        let bits = u32::from(addr);
        let cabinet = bits >> 19;
        let chassis = (bits >> 16) & 0x7;
        let slot = (bits >> 8) & 0xff;
        let bmc = bits & 0xff;
        format!("x{cabinet}c{chassis}s{slot}b{bmc}")
    }
}

impl IdMapper for GeneratedXnameMapper {
    fn mapped_id(&self, keys: &LookupKeys) -> Option<String> {
        match keys.bmc_ip_addr.parse::<Ipv4Addr>() {
            Ok(addr) => Some(Self::xname(addr)),
            Err(_) => {
                warn!(host = %keys.bmc_ip_addr, "cannot generate XNAME for non-IPv4 host");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "generated-xname"
    }
}

/// Looks IDs up in a [`BmcIdMap`]
#[derive(Debug, Clone)]
pub struct UserIdMapper {
    map: BmcIdMap,
}

impl UserIdMapper {
    /// Mapper over an already loaded map
    #[must_use]
    pub fn new(map: BmcIdMap) -> Self {
        Self { map }
    }

    /// Load the map from inline JSON/YAML or `@path`
    ///
    /// # Errors
    /// See [`BmcIdMap::from_source`].
    pub fn from_source(source: &str) -> IdMapResult<Self> {
        BmcIdMap::from_source(source).map(Self::new)
    }
}

impl IdMapper for UserIdMapper {
    fn mapped_id(&self, keys: &LookupKeys) -> Option<String> {
        let key = match self.map.map_key {
            MapKey::BmcIpAddr => &keys.bmc_ip_addr,
        };
        let id = self.map.id_map.get(key).cloned();
        if id.is_none() {
            warn!(map_key = %self.map.map_key, key = %key, "no ID mapped for BMC");
        }
        id
    }

    fn name(&self) -> &'static str {
        "user"
    }
}

/// User mapper whenever a map was supplied (even an empty one), else XNAME generation
#[must_use]
pub fn select_mapper(map: Option<BmcIdMap>) -> Arc<dyn IdMapper> {
    match map {
        Some(map) => Arc::new(UserIdMapper::new(map)),
        None => Arc::new(GeneratedXnameMapper),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_xname_layout() {
        let mapper = GeneratedXnameMapper;
        assert_eq!(
            mapper.mapped_id(&LookupKeys::for_host("10.254.1.5")).as_deref(),
            Some("x351c6s1b5")
        );
        assert_eq!(
            mapper.mapped_id(&LookupKeys::for_host("10.0.0.1")).as_deref(),
            Some("x320c0s0b1")
        );
        assert_eq!(GeneratedXnameMapper::xname(Ipv4Addr::new(0, 0, 0, 0)), "x0c0s0b0");
    }

    #[test]
    fn test_xname_deterministic() {
        let keys = LookupKeys::for_host("172.16.3.40");
        let a = GeneratedXnameMapper.mapped_id(&keys);
        let b = GeneratedXnameMapper.mapped_id(&keys);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_xname_rejects_non_ipv4() {
        assert!(GeneratedXnameMapper.mapped_id(&LookupKeys::for_host("bmc01.example")).is_none());
        assert!(GeneratedXnameMapper.mapped_id(&LookupKeys::for_host("fe80::1")).is_none());
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json = r#"{"id_map": {"10.0.0.5": "x1000c0s0b0"}, "map_key": "bmc-ip-addr"}"#;
        let yaml = "id_map:\n  10.0.0.5: x1000c0s0b0\nmap_key: bmc-ip-addr\n";
        assert_eq!(BmcIdMap::parse(json).unwrap(), BmcIdMap::parse(yaml).unwrap());
    }

    #[test]
    fn test_unknown_map_key() {
        let err = BmcIdMap::parse(r#"{"id_map": {}, "map_key": "serial"}"#).unwrap_err();
        assert!(matches!(err, IdMapError::UnknownMapKey(k) if k == "serial"));
    }

    #[test]
    fn test_from_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id_map:\n  10.0.0.7: x3000c0s7b0").unwrap();

        let source = format!("@{}", file.path().display());
        let mapper = UserIdMapper::from_source(&source).unwrap();
        assert_eq!(
            mapper.mapped_id(&LookupKeys::for_host("10.0.0.7")).as_deref(),
            Some("x3000c0s7b0")
        );
        assert!(mapper.mapped_id(&LookupKeys::for_host("10.0.0.8")).is_none());
    }

    #[test]
    fn test_missing_file_source() {
        let err = BmcIdMap::from_source("@/nonexistent/idmap.yaml").unwrap_err();
        assert!(matches!(err, IdMapError::Io { .. }));
    }

    #[test]
    fn test_select_mapper() {
        assert_eq!(select_mapper(None).name(), "generated-xname");

        let empty = select_mapper(Some(BmcIdMap::default()));
        assert_eq!(empty.name(), "user");
        assert!(empty.mapped_id(&LookupKeys::for_host("10.0.0.1")).is_none());
    }
}
