//! IPv4 CIDR arithmetic for shortcut remapping
//!
//! The topology is IPv4-only: IPv6 input is rejected explicitly rather than
//! passed through or treated as a non-match. Remapping relocates an address
//! into a target network while preserving its host bits, which requires the
//! source and target CIDRs to share a prefix length - callers enforce that
//! precondition before remapping.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::{IpNet, Ipv4Net};

use crate::{Error, Result};

/// Parse an IPv4 address, rejecting IPv6 and malformed input
pub fn parse_ipv4(address: &str) -> Result<Ipv4Addr> {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(Error::address_format_for(
            address,
            "only IPv4 addresses are supported",
        )),
        Err(_) => Err(Error::address_format_for(address, "invalid IP address")),
    }
}

/// Parse an IPv4 CIDR block, rejecting IPv6 and malformed input
pub fn parse_ipv4_cidr(cidr: &str) -> Result<Ipv4Net> {
    match cidr.parse::<IpNet>() {
        Ok(IpNet::V4(net)) => Ok(net),
        Ok(IpNet::V6(_)) => Err(Error::address_format_for(
            cidr,
            "only IPv4 CIDRs are supported",
        )),
        Err(_) => Err(Error::address_format_for(cidr, "invalid CIDR")),
    }
}

/// Relocate an address into `target`, preserving its host bits.
///
/// For each octet: `(network[i] & mask[i]) | (address[i] & !mask[i])`.
pub fn remap_into(address: Ipv4Addr, target: &Ipv4Net) -> Ipv4Addr {
    let network = target.network().octets();
    let mask = target.netmask().octets();
    let addr = address.octets();

    let mut remapped = [0u8; 4];
    for i in 0..4 {
        remapped[i] = (network[i] & mask[i]) | (addr[i] & !mask[i]);
    }
    Ipv4Addr::from(remapped)
}
