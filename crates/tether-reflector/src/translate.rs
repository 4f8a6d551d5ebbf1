//! Endpoint translation engine
//!
//! Walks every address of every filtered-in endpoint and decides its
//! remapping path. Shortcut matches are finalized here, one emitted endpoint
//! per matched address, and recorded for the label hand-off; an endpoint
//! with no shortcut match is emitted once with the default translator
//! applied over its full address list. The engine is pure with respect to
//! its inputs: concurrent calls share no state and need no synchronization.

use k8s_openapi::api::discovery::v1::Endpoint;
use tracing::{debug, warn};

use tether_common::crd::{
    CidrPair, ClusterConnection, ConditionsTemplate, EndpointTemplate, ForZone, HintsTemplate,
    TargetRef,
};
use tether_common::ClusterId;

use crate::directory;
use crate::filter::{should_reflect, NodeDirectory};
use crate::shortcut;

/// The engine's output: translated endpoints plus the addresses finalized
/// by the shortcut path
#[derive(Clone, Debug, Default)]
pub struct TranslationOutcome {
    /// Translated endpoints, in source endpoint order
    pub endpoints: Vec<EndpointTemplate>,
    /// Remapped addresses that must never reach the default mapper
    pub shortcut_addresses: Vec<String>,
}

/// Translates a source cluster's endpoints for one destination cluster.
///
/// Both cluster identities are resolved once by the surrounding process and
/// passed in explicitly, keeping the engine free of ambient state.
pub struct EndpointTranslationEngine {
    local: ClusterId,
    destination: ClusterId,
}

impl EndpointTranslationEngine {
    /// Create an engine translating from `local` towards `destination`
    pub fn new(local: ClusterId, destination: ClusterId) -> Self {
        Self { local, destination }
    }

    /// The destination cluster this engine translates towards
    pub fn destination(&self) -> &ClusterId {
        &self.destination
    }

    /// Translate the local endpoints using the given connection records.
    ///
    /// Per-address resolver errors are logged and demoted to non-matches;
    /// they never abort the endpoint or the call. Records that do not
    /// reference the destination simply mean the hub path applies to every
    /// address.
    pub fn translate<F>(
        &self,
        locals: &[Endpoint],
        nodes: &dyn NodeDirectory,
        records: &[ClusterConnection],
        default_translator: F,
    ) -> TranslationOutcome
    where
        F: Fn(&[String]) -> Vec<String>,
    {
        let pairs = match directory::cidrs_for_cluster(records, &self.destination) {
            Ok(pairs) => pairs,
            Err(e) => {
                debug!(cluster = %self.destination, error = %e, "no shortcut pairs, hub path only");
                Vec::new()
            }
        };

        let mut outcome = TranslationOutcome::default();

        for local in locals {
            let verdict = should_reflect(local, nodes, &self.destination);
            if !verdict.is_reflected() {
                debug!(?verdict, "endpoint not reflected");
                continue;
            }

            self.translate_endpoint(local, &pairs, &default_translator, &mut outcome);
        }

        outcome
    }

    fn translate_endpoint<F>(
        &self,
        local: &Endpoint,
        pairs: &[CidrPair],
        default_translator: &F,
        outcome: &mut TranslationOutcome,
    ) where
        F: Fn(&[String]) -> Vec<String>,
    {
        let mut matched = 0usize;

        for address in &local.addresses {
            match shortcut::resolve(address, pairs) {
                Ok(Some(remapped)) => {
                    debug!(address, remapped, "address takes the shortcut path");
                    outcome.shortcut_addresses.push(remapped.clone());
                    outcome
                        .endpoints
                        .push(self.carried_endpoint(local, vec![remapped]));
                    matched += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    // A bad address fails only itself; the hub path may
                    // still produce something usable for the endpoint
                    warn!(address, error = %e, "shortcut resolution failed, treating as non-match");
                }
            }
        }

        if matched > 0 {
            // The remaining addresses of this endpoint are dropped rather
            // than routed through the hub
            debug!(
                dropped = local.addresses.len() - matched,
                "endpoint finalized by shortcut, skipping default path"
            );
            return;
        }

        let translated = default_translator(&local.addresses);
        outcome
            .endpoints
            .push(self.carried_endpoint(local, translated));
    }

    /// Build an emitted endpoint: the given addresses, deep copies of the
    /// carried-over fields, and node identity set to the origin cluster
    fn carried_endpoint(&self, local: &Endpoint, addresses: Vec<String>) -> EndpointTemplate {
        EndpointTemplate {
            addresses,
            conditions: local.conditions.as_ref().map(|c| ConditionsTemplate {
                ready: c.ready,
                serving: c.serving,
                terminating: c.terminating,
            }),
            hostname: local.hostname.clone(),
            target_ref: local.target_ref.as_ref().map(|r| TargetRef {
                kind: r.kind.clone(),
                namespace: r.namespace.clone(),
                name: r.name.clone(),
                uid: r.uid.clone(),
            }),
            node_name: Some(self.local.to_string()),
            zone: local.zone.clone(),
            hints: local.hints.as_ref().map(|h| HintsTemplate {
                for_zones: h
                    .for_zones
                    .iter()
                    .flatten()
                    .map(|z| ForZone {
                        name: z.name.clone(),
                    })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use k8s_openapi::api::core::v1::ObjectReference;
    use k8s_openapi::api::discovery::v1::EndpointConditions;
    use kube::api::ObjectMeta;

    use crate::filter::tests::MapNodeDirectory;
    use tether_common::crd::{
        ClusterConnectionSpec, ClusterConnectionStatus, ConnectionNetworking,
    };

    fn engine() -> EndpointTranslationEngine {
        EndpointTranslationEngine::new(ClusterId::new("origin"), ClusterId::new("edge-east"))
    }

    fn records() -> Vec<ClusterConnection> {
        vec![ClusterConnection {
            metadata: ObjectMeta {
                name: Some("edge-east-hub".to_string()),
                ..Default::default()
            },
            spec: ClusterConnectionSpec {
                cluster_a: ClusterId::new("edge-east"),
                cluster_b: ClusterId::new("hub"),
            },
            status: Some(ClusterConnectionStatus {
                cluster_a_networking: ConnectionNetworking {
                    pod_cidr: "10.0.1.0/24".to_string(),
                    shortcut_pod_cidr: "10.244.0.0/24".to_string(),
                },
                cluster_b_networking: ConnectionNetworking::default(),
            }),
        }]
    }

    fn nodes() -> MapNodeDirectory {
        MapNodeDirectory(HashMap::from([
            ("node-origin".to_string(), ClusterId::new("origin")),
            ("node-east".to_string(), ClusterId::new("edge-east")),
        ]))
    }

    fn endpoint(addresses: &[&str], node: Option<&str>) -> Endpoint {
        Endpoint {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            node_name: node.map(str::to_string),
            ..Default::default()
        }
    }

    /// Pass-through default translator for tests that exercise the shortcut path
    fn identity(addresses: &[String]) -> Vec<String> {
        addresses.to_vec()
    }

    // =========================================================================
    // Shortcut path
    // =========================================================================

    #[test]
    fn matched_address_is_remapped_and_recorded() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5"], Some("node-origin"))],
            &nodes(),
            &records(),
            identity,
        );

        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].addresses, vec!["10.244.0.5"]);
        assert_eq!(outcome.shortcut_addresses, vec!["10.244.0.5"]);
    }

    #[test]
    fn shortcut_match_drops_the_remaining_addresses_of_the_endpoint() {
        // Only 10.0.1.5 falls in the observed range; 10.0.9.9 is dropped
        // entirely and no default-path endpoint is emitted for this source
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5", "10.0.9.9"], Some("node-origin"))],
            &nodes(),
            &records(),
            |_| panic!("default translator must not run for a shortcut-finalized endpoint"),
        );

        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].addresses, vec!["10.244.0.5"]);
        assert_eq!(outcome.shortcut_addresses, vec!["10.244.0.5"]);
    }

    #[test]
    fn every_matched_address_emits_its_own_single_address_endpoint() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5", "10.0.1.9"], Some("node-origin"))],
            &nodes(),
            &records(),
            identity,
        );

        assert_eq!(outcome.endpoints.len(), 2);
        assert_eq!(outcome.endpoints[0].addresses, vec!["10.244.0.5"]);
        assert_eq!(outcome.endpoints[1].addresses, vec!["10.244.0.9"]);
        assert_eq!(
            outcome.shortcut_addresses,
            vec!["10.244.0.5", "10.244.0.9"]
        );
    }

    #[test]
    fn shortcut_endpoint_node_identity_is_the_origin_cluster() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5"], Some("node-origin"))],
            &nodes(),
            &records(),
            identity,
        );
        assert_eq!(outcome.endpoints[0].node_name.as_deref(), Some("origin"));
    }

    // =========================================================================
    // Default (hub) path
    // =========================================================================

    #[test]
    fn unmatched_endpoint_goes_through_the_default_translator_as_a_batch() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.9.9", "10.0.9.10"], Some("node-origin"))],
            &nodes(),
            &records(),
            |addrs| addrs.iter().map(|a| format!("hub-{}", a)).collect(),
        );

        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(
            outcome.endpoints[0].addresses,
            vec!["hub-10.0.9.9", "hub-10.0.9.10"]
        );
        assert!(outcome.shortcut_addresses.is_empty());
    }

    #[test]
    fn no_records_for_destination_means_hub_path_only() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5"], Some("node-origin"))],
            &nodes(),
            &[],
            identity,
        );

        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].addresses, vec!["10.0.1.5"]);
        assert!(outcome.shortcut_addresses.is_empty());
    }

    #[test]
    fn resolver_error_on_one_address_does_not_abort_the_endpoint() {
        // The IPv6 address fails resolution and is treated as a non-match;
        // with no shortcut found, the whole original list takes the hub path
        let outcome = engine().translate(
            &[endpoint(&["fe80::1", "10.0.9.9"], Some("node-origin"))],
            &nodes(),
            &records(),
            identity,
        );

        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].addresses, vec!["fe80::1", "10.0.9.9"]);
        assert!(outcome.shortcut_addresses.is_empty());
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    #[test]
    fn endpoint_native_to_destination_is_never_emitted() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.1.5"], Some("node-east"))],
            &nodes(),
            &records(),
            identity,
        );
        assert!(outcome.endpoints.is_empty());
        assert!(outcome.shortcut_addresses.is_empty());
    }

    #[test]
    fn endpoint_with_unresolvable_node_is_suppressed() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.9.9"], Some("node-gone"))],
            &nodes(),
            &records(),
            identity,
        );
        assert!(outcome.endpoints.is_empty());
    }

    #[test]
    fn endpoint_without_node_is_reflected() {
        let outcome = engine().translate(
            &[endpoint(&["10.0.9.9"], None)],
            &nodes(),
            &records(),
            identity,
        );
        assert_eq!(outcome.endpoints.len(), 1);
    }

    // =========================================================================
    // Ordering and carried fields
    // =========================================================================

    #[test]
    fn source_endpoint_order_is_preserved() {
        let outcome = engine().translate(
            &[
                endpoint(&["10.0.9.1"], Some("node-origin")),
                endpoint(&["10.0.1.5"], Some("node-origin")),
                endpoint(&["10.0.9.2"], None),
            ],
            &nodes(),
            &records(),
            identity,
        );

        assert_eq!(outcome.endpoints.len(), 3);
        assert_eq!(outcome.endpoints[0].addresses, vec!["10.0.9.1"]);
        assert_eq!(outcome.endpoints[1].addresses, vec!["10.244.0.5"]);
        assert_eq!(outcome.endpoints[2].addresses, vec!["10.0.9.2"]);
    }

    #[test]
    fn carried_fields_are_deep_copies_of_the_source() {
        let local = Endpoint {
            addresses: vec!["10.0.1.5".to_string()],
            conditions: Some(EndpointConditions {
                ready: Some(true),
                serving: Some(true),
                terminating: Some(false),
            }),
            hostname: Some("web-0".to_string()),
            node_name: Some("node-origin".to_string()),
            target_ref: Some(ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some("web-0".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            }),
            zone: Some("zone-a".to_string()),
            ..Default::default()
        };

        let outcome = engine().translate(&[local], &nodes(), &records(), identity);

        let emitted = &outcome.endpoints[0];
        assert_eq!(emitted.hostname.as_deref(), Some("web-0"));
        assert_eq!(emitted.zone.as_deref(), Some("zone-a"));
        assert_eq!(emitted.conditions.unwrap().ready, Some(true));
        let target = emitted.target_ref.as_ref().unwrap();
        assert_eq!(target.kind.as_deref(), Some("Pod"));
        assert_eq!(target.name.as_deref(), Some("web-0"));
        // The node identity is rewritten, not carried
        assert_eq!(emitted.node_name.as_deref(), Some("origin"));
    }
}
