//! Turning operator input into scan targets

use std::net::Ipv4Addr;

use tracing::debug;

use crate::error::{Result, ScanError};

/// Smallest prefix length accepted for subnet expansion
pub const MIN_PREFIX: u8 = 16;

/// Strip scheme, credentials, port and path from a host or URI
///
/// `https://10.0.0.1:443/redfish/v1` becomes `10.0.0.1`.
#[must_use]
pub fn normalize_host(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, rest)| rest);

    if let Some(bracketed) = host_port.strip_prefix('[') {
        return bracketed
            .split_once(']')
            .map_or(bracketed, |(host, _)| host)
            .to_string();
    }

    host_port
        .split_once(':')
        .map_or(host_port, |(host, _)| host)
        .to_string()
}

/// Parse a dotted-quad subnet mask such as `255.255.255.0` into a prefix length
///
/// # Errors
/// Returns `ScanError::InvalidMask` if the mask is not contiguous.
pub fn mask_to_prefix(mask: &str) -> Result<u8> {
    let addr: Ipv4Addr = mask
        .trim()
        .parse()
        .map_err(|_| ScanError::InvalidMask(mask.to_string()))?;
    let bits = u32::from(addr);
    let ones = bits.leading_ones();

    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return Err(ScanError::InvalidMask(mask.to_string()));
    }

    // leading_ones() of a u32 is at most 32
    Ok(u8::try_from(ones).unwrap_or(32))
}

/// Expand a subnet into its usable host addresses
///
/// Accepts `a.b.c.d/len`, or a bare address combined with `mask`
/// (`255.255.255.0`); a bare address without a mask is taken as a /24.
/// Network and broadcast addresses are excluded for prefixes shorter than /31.
///
/// # Errors
/// Returns an error if the subnet or mask cannot be parsed, or if the subnet is
/// larger than `/MIN_PREFIX`.
pub fn expand_subnet(subnet: &str, mask: Option<&str>) -> Result<Vec<String>> {
    let subnet = subnet.trim();
    let (addr, prefix) = match subnet.split_once('/') {
        Some((addr, len)) => {
            let prefix: u8 = len
                .parse()
                .map_err(|_| ScanError::InvalidTarget(subnet.to_string()))?;
            (addr, prefix)
        }
        None => match mask {
            Some(mask) => (subnet, mask_to_prefix(mask)?),
            None => (subnet, 24),
        },
    };

    if prefix > 32 {
        return Err(ScanError::InvalidTarget(subnet.to_string()));
    }
    if prefix < MIN_PREFIX {
        return Err(ScanError::SubnetTooLarge {
            subnet: subnet.to_string(),
            prefix,
            min: MIN_PREFIX,
        });
    }

    let addr: Ipv4Addr = normalize_host(addr)
        .parse()
        .map_err(|_| ScanError::InvalidTarget(subnet.to_string()))?;

    let host_bits = 32 - u32::from(prefix);
    let netmask = u32::MAX.checked_shl(host_bits).unwrap_or(0);
    let network = u32::from(addr) & netmask;
    let broadcast = network | !netmask;

    let (first, last) = if prefix >= 31 {
        (network, broadcast)
    } else {
        (network + 1, broadcast - 1)
    };

    let hosts: Vec<String> = (first..=last)
        .map(|ip| Ipv4Addr::from(ip).to_string())
        .collect();

    debug!(subnet, prefix, count = hosts.len(), "expanded subnet");
    Ok(hosts)
}

/// Merge explicit hosts and expanded subnets into one de-duplicated list
///
/// Input order is preserved, explicit hosts first.
///
/// # Errors
/// Returns an error if any subnet cannot be expanded.
pub fn build_targets(hosts: &[String], subnets: &[String], mask: Option<&str>) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut targets = Vec::new();

    let explicit = hosts.iter().map(|h| normalize_host(h));
    for host in explicit {
        if !host.is_empty() && seen.insert(host.clone()) {
            targets.push(host);
        }
    }

    for subnet in subnets {
        for host in expand_subnet(subnet, mask)? {
            if seen.insert(host.clone()) {
                targets.push(host);
            }
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_host("https://10.0.0.1:443/redfish/v1"), "10.0.0.1");
        assert_eq!(normalize_host("https://root:pw@bmc01.local"), "bmc01.local");
        assert_eq!(normalize_host("[fe80::1]:443"), "fe80::1");
    }

    #[test]
    fn test_expand_slash_30() {
        let hosts = expand_subnet("172.16.0.0/30", None).unwrap();
        assert_eq!(hosts, vec!["172.16.0.1", "172.16.0.2"]);
    }

    #[test]
    fn test_expand_with_mask() {
        let hosts = expand_subnet("10.1.2.77", Some("255.255.255.0")).unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first().unwrap(), "10.1.2.1");
        assert_eq!(hosts.last().unwrap(), "10.1.2.254");
    }

    #[test]
    fn test_single_host_subnet() {
        assert_eq!(expand_subnet("10.0.0.9/32", None).unwrap(), vec!["10.0.0.9"]);
    }

    #[test]
    fn test_rejects_huge_and_bad_subnets() {
        assert!(matches!(
            expand_subnet("10.0.0.0/8", None),
            Err(ScanError::SubnetTooLarge { .. })
        ));
        assert!(expand_subnet("10.0.0.0/40", None).is_err());
        assert!(expand_subnet("not-an-ip/24", None).is_err());
        assert!(mask_to_prefix("255.0.255.0").is_err());
    }

    #[test]
    fn test_mask_to_prefix() {
        assert_eq!(mask_to_prefix("255.255.255.0").unwrap(), 24);
        assert_eq!(mask_to_prefix("255.255.0.0").unwrap(), 16);
        assert_eq!(mask_to_prefix("255.255.255.255").unwrap(), 32);
    }

    #[test]
    fn test_build_targets_dedupes() {
        let targets = build_targets(
            &["https://172.16.0.1".to_string(), "bmc.example".to_string()],
            &["172.16.0.0/30".to_string()],
            None,
        )
        .unwrap();
        assert_eq!(targets, vec!["172.16.0.1", "bmc.example", "172.16.0.2"]);
    }
}
