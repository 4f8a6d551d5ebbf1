//! ClusterConnection CRD - per-pair networking topology records
//!
//! One record per cluster pair. Each side carries the CIDR its pods occupy
//! as seen by the hub (`podCidr`) and the range to remap into when the pair
//! shares a direct shortcut (`shortcutPodCidr`). Records are written by the
//! connectivity layer and are read-only for the reflection pipeline.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identity::ClusterId;

/// Spec for a ClusterConnection - names the two sides of the pair
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "tether.dev",
    version = "v1alpha1",
    kind = "ClusterConnection",
    plural = "clusterconnections",
    shortname = "ccon",
    namespaced,
    status = "ClusterConnectionStatus",
    printcolumn = r#"{"name":"ClusterA","type":"string","jsonPath":".spec.clusterA"}"#,
    printcolumn = r#"{"name":"ClusterB","type":"string","jsonPath":".spec.clusterB"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConnectionSpec {
    /// First side of the pair
    pub cluster_a: ClusterId,

    /// Second side of the pair
    pub cluster_b: ClusterId,
}

/// Status for a ClusterConnection - networking as negotiated per side
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConnectionStatus {
    /// Networking for the `clusterA` side
    #[serde(default)]
    pub cluster_a_networking: ConnectionNetworking,

    /// Networking for the `clusterB` side
    #[serde(default)]
    pub cluster_b_networking: ConnectionNetworking,
}

/// CIDRs negotiated for one side of a connection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionNetworking {
    /// Pod range of this side as seen by the hub; empty until negotiated
    #[serde(default)]
    pub pod_cidr: String,

    /// Range to remap into when the direct shortcut applies
    #[serde(default)]
    pub shortcut_pod_cidr: String,
}

/// The pair of ranges driving a single shortcut decision: membership is
/// tested against `observed`, the remap lands in `shortcut`
#[derive(Clone, Debug, PartialEq)]
pub struct CidrPair {
    /// The range the cluster's pods occupy as seen by the hub
    pub observed: String,
    /// The alternate range to remap into over the shortcut
    pub shortcut: String,
}

impl ConnectionNetworking {
    /// The CIDR pair for this side, if the hub-observed range is negotiated
    pub fn cidr_pair(&self) -> Option<CidrPair> {
        if self.pod_cidr.is_empty() {
            return None;
        }
        Some(CidrPair {
            observed: self.pod_cidr.clone(),
            shortcut: self.shortcut_pod_cidr.clone(),
        })
    }
}

impl ClusterConnection {
    /// The CIDR pair this record contributes for `cluster`, if it references
    /// the cluster on either side and that side's range is negotiated
    pub fn cidr_pair_for(&self, cluster: &ClusterId) -> Option<CidrPair> {
        let status = self.status.as_ref()?;
        if self.spec.cluster_a == *cluster {
            return status.cluster_a_networking.cidr_pair();
        }
        if self.spec.cluster_b == *cluster {
            return status.cluster_b_networking.cidr_pair();
        }
        None
    }
}
