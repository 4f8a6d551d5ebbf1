//! Cluster identity resolution
//!
//! Each peer cluster is served through a dedicated tenant namespace named
//! `tether-tenant-<cluster>`. The process resolves its own cluster identity
//! from that convention exactly once at startup and threads it through as an
//! explicit value - there is no global mutable identity state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix of tenant namespaces; the remainder is the cluster name
pub const TENANT_NAMESPACE_PREFIX: &str = "tether-tenant-";

/// Opaque identifier for a cluster within the topology
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Create a cluster identifier from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The cluster name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClusterId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Resolve the cluster a tenant namespace belongs to.
///
/// A namespace that does not match the `tether-tenant-<cluster>` convention
/// is a configuration error, never an empty identity: callers must not fall
/// back to a silently substituted name.
pub fn cluster_from_tenant_namespace(namespace: &str) -> Result<ClusterId> {
    match namespace.strip_prefix(TENANT_NAMESPACE_PREFIX) {
        Some(name) if !name.is_empty() => Ok(ClusterId::new(name)),
        _ => Err(Error::configuration_in(
            "identity",
            format!(
                "namespace {:?} does not match the {}<cluster> convention",
                namespace, TENANT_NAMESPACE_PREFIX
            ),
        )),
    }
}

/// The tenant namespace serving a cluster
pub fn tenant_namespace(cluster: &ClusterId) -> String {
    format!("{}{}", TENANT_NAMESPACE_PREFIX, cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_name_is_extracted_from_tenant_namespace() {
        let cluster = cluster_from_tenant_namespace("tether-tenant-edge-west").unwrap();
        assert_eq!(cluster.as_str(), "edge-west");
    }

    #[test]
    fn non_tenant_namespace_is_a_configuration_error() {
        let err = cluster_from_tenant_namespace("default").unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.context(), Some("identity"));
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn bare_prefix_is_rejected() {
        // "tether-tenant-" with nothing after it must not yield an empty name
        assert!(cluster_from_tenant_namespace(TENANT_NAMESPACE_PREFIX).is_err());
    }

    #[test]
    fn tenant_namespace_round_trip() {
        let cluster = ClusterId::new("prod");
        let ns = tenant_namespace(&cluster);
        assert_eq!(ns, "tether-tenant-prod");
        assert_eq!(cluster_from_tenant_namespace(&ns).unwrap(), cluster);
    }

    #[test]
    fn cluster_id_display_and_serde_are_transparent() {
        let cluster = ClusterId::from("edge-east");
        assert_eq!(cluster.to_string(), "edge-east");
        assert_eq!(serde_json::to_string(&cluster).unwrap(), "\"edge-east\"");
        let parsed: ClusterId = serde_json::from_str("\"edge-east\"").unwrap();
        assert_eq!(parsed, cluster);
    }
}
