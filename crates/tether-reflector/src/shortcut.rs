//! Shortcut detection and remapping
//!
//! An address belongs to the shortcut path when it falls inside the
//! hub-observed range of a connection record relevant to the destination
//! cluster. The remap relocates it into that record's shortcut range,
//! keeping the host bits - which requires both ranges to share a prefix
//! length. Candidate pairs are scanned in directory order, first match wins.

use tracing::warn;

use tether_common::crd::CidrPair;
use tether_common::net::{parse_ipv4, parse_ipv4_cidr, remap_into};
use tether_common::Result;

/// Resolve an address against the candidate CIDR pairs.
///
/// Returns the remapped address on the first containment match, `None` when
/// no pair contains the address. A non-IPv4 or unparseable address is an
/// error. A malformed pair (bad CIDR, IPv6, mismatched prefix lengths) does
/// not fail the address: the pair is skipped with a warning and the scan
/// continues with the remaining pairs.
pub fn resolve(address: &str, pairs: &[CidrPair]) -> Result<Option<String>> {
    let addr = parse_ipv4(address)?;

    for pair in pairs {
        let observed = match parse_ipv4_cidr(&pair.observed) {
            Ok(net) => net,
            Err(e) => {
                warn!(cidr = %pair.observed, error = %e, "skipping connection pair with bad observed CIDR");
                continue;
            }
        };

        if !observed.contains(&addr) {
            continue;
        }

        let shortcut = match parse_ipv4_cidr(&pair.shortcut) {
            Ok(net) => net,
            Err(e) => {
                warn!(cidr = %pair.shortcut, error = %e, "skipping connection pair with bad shortcut CIDR");
                continue;
            }
        };

        // Host-bit placement is only defined when both ranges share a prefix
        if observed.prefix_len() != shortcut.prefix_len() {
            warn!(
                observed = %pair.observed,
                shortcut = %pair.shortcut,
                "skipping connection pair with mismatched prefix lengths"
            );
            continue;
        }

        // Only one shortcut per address is expected
        return Ok(Some(remap_into(addr, &shortcut).to_string()));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(observed: &str, shortcut: &str) -> CidrPair {
        CidrPair {
            observed: observed.to_string(),
            shortcut: shortcut.to_string(),
        }
    }

    #[test]
    fn address_in_observed_range_is_remapped_into_shortcut_range() {
        let pairs = vec![pair("10.0.1.0/24", "10.244.0.0/24")];
        let remapped = resolve("10.0.1.5", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("10.244.0.5"));
    }

    #[test]
    fn address_outside_every_range_is_not_matched_and_not_an_error() {
        let pairs = vec![
            pair("10.0.1.0/24", "10.244.0.0/24"),
            pair("10.0.2.0/24", "10.245.0.0/24"),
        ];
        assert_eq!(resolve("192.168.7.1", &pairs).unwrap(), None);
    }

    #[test]
    fn first_matching_pair_wins_in_directory_order() {
        // Overlapping ranges are a misconfiguration; resolution stays
        // deterministic by honoring iteration order
        let pairs = vec![
            pair("10.0.0.0/16", "10.244.0.0/16"),
            pair("10.0.1.0/24", "10.250.0.0/24"),
        ];
        let remapped = resolve("10.0.1.5", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("10.244.1.5"));
    }

    #[test]
    fn non_ipv4_address_is_an_error() {
        let pairs = vec![pair("10.0.1.0/24", "10.244.0.0/24")];
        assert!(resolve("fe80::1", &pairs).is_err());
        assert!(resolve("not-an-ip", &pairs).is_err());
    }

    #[test]
    fn malformed_observed_cidr_skips_the_pair_and_scan_continues() {
        let pairs = vec![
            pair("bogus", "10.244.0.0/24"),
            pair("10.0.1.0/24", "10.245.0.0/24"),
        ];
        let remapped = resolve("10.0.1.5", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("10.245.0.5"));
    }

    #[test]
    fn malformed_shortcut_cidr_skips_the_pair_and_scan_continues() {
        let pairs = vec![
            pair("10.0.1.0/24", "10.244.0.0/99"),
            pair("10.0.1.0/24", "10.245.0.0/24"),
        ];
        let remapped = resolve("10.0.1.5", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("10.245.0.5"));
    }

    #[test]
    fn mismatched_prefix_lengths_skip_the_pair() {
        let pairs = vec![pair("10.0.1.0/24", "10.244.0.0/16")];
        assert_eq!(resolve("10.0.1.5", &pairs).unwrap(), None);
    }

    #[test]
    fn ipv6_cidr_is_skipped_not_fatal() {
        let pairs = vec![
            pair("2001:db8::/64", "2001:db9::/64"),
            pair("10.0.1.0/24", "10.244.0.0/24"),
        ];
        let remapped = resolve("10.0.1.5", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("10.244.0.5"));
    }

    #[test]
    fn host_bits_survive_the_remap() {
        let pairs = vec![pair("10.8.0.0/16", "172.30.0.0/16")];
        let remapped = resolve("10.8.42.7", &pairs).unwrap();
        assert_eq!(remapped.as_deref(), Some("172.30.42.7"));
    }

    #[test]
    fn empty_pair_list_never_matches() {
        assert_eq!(resolve("10.0.1.5", &[]).unwrap(), None);
    }
}
