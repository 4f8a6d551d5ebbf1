//! Endpoint reflection filter
//!
//! Filters out endpoints targeting pods the destination cluster already runs
//! natively - reflecting those would duplicate the endpoint, since the
//! destination's own control plane manages the slice for the local pod.
//! Lookup failures fall closed (do not reflect): non-duplication is favored
//! over completeness, and the two suppression cases stay distinguishable.

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::discovery::v1::Endpoint;
use kube::runtime::reflector::{ObjectRef, Store};
use tracing::{debug, warn};

use tether_common::{ClusterId, Error, Result, REMOTE_CLUSTER_ID_LABEL};

/// Resolves which cluster owns a node
pub trait NodeDirectory {
    /// The cluster owning `node_name`.
    ///
    /// Missing node or missing/empty cluster-id label is a lookup error.
    fn cluster_of(&self, node_name: &str) -> Result<ClusterId>;
}

/// Node directory backed by a kube reflector store snapshot
pub struct StoreNodeDirectory {
    store: Store<Node>,
}

impl StoreNodeDirectory {
    /// Wrap a node reflector store
    pub fn new(store: Store<Node>) -> Self {
        Self { store }
    }
}

impl NodeDirectory for StoreNodeDirectory {
    fn cluster_of(&self, node_name: &str) -> Result<ClusterId> {
        let node = self
            .store
            .get(&ObjectRef::new(node_name))
            .ok_or_else(|| Error::lookup(node_name, "node not found"))?;

        node.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(REMOTE_CLUSTER_ID_LABEL))
            .filter(|value| !value.is_empty())
            .map(|value| ClusterId::new(value.clone()))
            .ok_or_else(|| {
                Error::lookup(
                    node_name,
                    format!("label {} missing or empty", REMOTE_CLUSTER_ID_LABEL),
                )
            })
    }
}

/// Outcome of the reflection decision for one endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReflectionVerdict {
    /// The endpoint is eligible for reflection
    Reflect,
    /// Suppressed: the destination cluster natively runs the backing pod
    SkipNative,
    /// Suppressed: node ownership could not be resolved (fail-closed)
    SkipLookupFailed,
}

impl ReflectionVerdict {
    /// Whether the endpoint passes the filter
    pub fn is_reflected(&self) -> bool {
        matches!(self, Self::Reflect)
    }
}

/// Decide whether an endpoint should be reflected towards `destination`.
///
/// An endpoint without a node reference is external to the cluster and is
/// always reflected - it cannot be scheduled on a node the destination owns.
pub fn should_reflect(
    endpoint: &Endpoint,
    nodes: &dyn NodeDirectory,
    destination: &ClusterId,
) -> ReflectionVerdict {
    let Some(node_name) = endpoint.node_name.as_deref() else {
        debug!("endpoint without nodeName, probably external to the cluster; reflecting");
        return ReflectionVerdict::Reflect;
    };

    let owner = match nodes.cluster_of(node_name) {
        Ok(owner) => owner,
        Err(e) => {
            warn!(node = node_name, error = %e, "node ownership unresolved, suppressing endpoint");
            return ReflectionVerdict::SkipLookupFailed;
        }
    };

    if owner == *destination {
        // The associated endpointslice is already handled on the destination
        // cluster by Kubernetes, due to the presence of the local pod.
        debug!(node = node_name, cluster = %owner, "endpoint native to destination, suppressing");
        ReflectionVerdict::SkipNative
    } else {
        ReflectionVerdict::Reflect
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fake directory over a name -> cluster map; absent names fail lookup
    pub(crate) struct MapNodeDirectory(pub HashMap<String, ClusterId>);

    impl NodeDirectory for MapNodeDirectory {
        fn cluster_of(&self, node_name: &str) -> Result<ClusterId> {
            self.0
                .get(node_name)
                .cloned()
                .ok_or_else(|| Error::lookup(node_name, "node not found"))
        }
    }

    fn endpoint_on(node: Option<&str>) -> Endpoint {
        Endpoint {
            addresses: vec!["10.0.1.5".to_string()],
            node_name: node.map(str::to_string),
            ..Default::default()
        }
    }

    fn directory() -> MapNodeDirectory {
        MapNodeDirectory(HashMap::from([
            ("node-1".to_string(), ClusterId::new("edge-west")),
            ("node-2".to_string(), ClusterId::new("edge-east")),
        ]))
    }

    #[test]
    fn endpoint_without_node_is_always_reflected() {
        let verdict = should_reflect(
            &endpoint_on(None),
            &directory(),
            &ClusterId::new("edge-east"),
        );
        assert_eq!(verdict, ReflectionVerdict::Reflect);
        assert!(verdict.is_reflected());
    }

    #[test]
    fn endpoint_native_to_destination_is_suppressed() {
        let verdict = should_reflect(
            &endpoint_on(Some("node-2")),
            &directory(),
            &ClusterId::new("edge-east"),
        );
        assert_eq!(verdict, ReflectionVerdict::SkipNative);
        assert!(!verdict.is_reflected());
    }

    #[test]
    fn endpoint_owned_by_another_cluster_is_reflected() {
        let verdict = should_reflect(
            &endpoint_on(Some("node-1")),
            &directory(),
            &ClusterId::new("edge-east"),
        );
        assert_eq!(verdict, ReflectionVerdict::Reflect);
    }

    #[test]
    fn lookup_failure_fails_closed_with_a_distinct_verdict() {
        let verdict = should_reflect(
            &endpoint_on(Some("node-unknown")),
            &directory(),
            &ClusterId::new("edge-east"),
        );
        assert_eq!(verdict, ReflectionVerdict::SkipLookupFailed);
        assert_ne!(verdict, ReflectionVerdict::SkipNative);
    }
}
