//! ShadowEndpointSlice CRD - the reflected copy of a source endpoint list
//!
//! The forge writes one ShadowEndpointSlice per reflected EndpointSlice into
//! the destination tenant namespace; a later reconciliation pass materializes
//! it as a real `discovery.k8s.io/v1` EndpointSlice after applying the
//! default (hub-path) address mapping. The two passes share no in-memory
//! state: addresses already finalized by a shortcut are handed off through
//! the `tether.dev/shortcut-addresses` label and nothing else.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::discovery::v1 as discoveryv1;
use kube::api::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carrying the comma-joined set of shortcut-remapped addresses.
/// Absence means "no shortcut addresses for this resource".
pub const SHORTCUT_ADDRESSES_LABEL: &str = "tether.dev/shortcut-addresses";

/// Well-known Kubernetes label naming the manager of an EndpointSlice
pub const MANAGED_BY_LABEL: &str = "endpointslice.kubernetes.io/managed-by";

/// The manager value associated with reflected EndpointSlices
pub const ENDPOINT_SLICE_MANAGED_BY: &str = "endpointslice.reflection.tether.dev";

// =============================================================================
// CRD
// =============================================================================

/// Spec for a ShadowEndpointSlice - the template of the slice to materialize
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "tether.dev",
    version = "v1alpha1",
    kind = "ShadowEndpointSlice",
    plural = "shadowendpointslices",
    shortname = "seps",
    namespaced,
    status = "ShadowEndpointSliceStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShadowEndpointSliceSpec {
    /// The EndpointSlice to materialize on the destination side
    pub template: EndpointSliceTemplate,
}

/// Template of the materialized EndpointSlice
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSliceTemplate {
    /// Address type of the slice (always "IPv4" for this topology)
    pub address_type: String,

    /// Translated endpoints
    #[serde(default)]
    pub endpoints: Vec<EndpointTemplate>,

    /// Ports carried over from the source slice
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortTemplate>,
}

/// A single addressable backend entry within the slice
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTemplate {
    /// Addresses of the backend, in source order
    pub addresses: Vec<String>,

    /// Readiness conditions carried over from the source endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionsTemplate>,

    /// Hostname carried over from the source endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Reference to the backing object (typically the pod)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    /// Node identity; set to the origin cluster name for reflected endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Zone carried over from the source endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Topology hints carried over from the source endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<HintsTemplate>,
}

/// Endpoint readiness conditions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsTemplate {
    /// Whether the endpoint is ready to serve traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    /// Whether the endpoint is serving (independent of termination)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving: Option<bool>,

    /// Whether the endpoint is terminating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminating: Option<bool>,
}

/// Reference to the object backing an endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    /// Kind of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Namespace of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// UID of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Topology hints for an endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HintsTemplate {
    /// Zones the endpoint should be consumed from
    #[serde(default)]
    pub for_zones: Vec<ForZone>,
}

/// A zone an endpoint is hinted towards
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForZone {
    /// Zone name
    pub name: String,
}

/// A port exposed by the slice
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortTemplate {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Transport protocol (TCP, UDP, SCTP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Port number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Application protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_protocol: Option<String>,
}

// =============================================================================
// Status
// =============================================================================

/// Lifecycle phase of a ShadowEndpointSlice
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShadowPhase {
    /// Waiting for the mapping pass
    #[default]
    Pending,
    /// Materialized on the destination side
    Ready,
    /// Mapping or materialization failed
    Failed,
}

impl std::fmt::Display for ShadowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Status for a ShadowEndpointSlice
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShadowEndpointSliceStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ShadowPhase,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation the mapping pass last completed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ShadowEndpointSliceStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: ShadowPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

// =============================================================================
// Label hand-off
// =============================================================================

/// Serialize the shortcut address set as a single label value
pub fn encode_shortcut_addresses(addresses: &[String]) -> String {
    addresses.join(",")
}

/// Reconstruct the shortcut address set from the resource labels.
///
/// An absent or empty label yields an empty set.
pub fn shortcut_addresses(meta: &ObjectMeta) -> HashSet<String> {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(SHORTCUT_ADDRESSES_LABEL))
        .map(|value| {
            value
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The labels assigned to reflected EndpointSlices
pub fn reflection_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        MANAGED_BY_LABEL.to_string(),
        ENDPOINT_SLICE_MANAGED_BY.to_string(),
    )])
}

/// Whether the object is managed by the reflection logic
pub fn is_managed_by_reflection(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_BY_LABEL))
        .is_some_and(|value| value == ENDPOINT_SLICE_MANAGED_BY)
}

// =============================================================================
// Conversions to discovery.k8s.io/v1
// =============================================================================

impl EndpointTemplate {
    /// Render the template as a discovery/v1 Endpoint
    pub fn to_discovery(&self) -> discoveryv1::Endpoint {
        discoveryv1::Endpoint {
            addresses: self.addresses.clone(),
            conditions: self.conditions.map(|c| discoveryv1::EndpointConditions {
                ready: c.ready,
                serving: c.serving,
                terminating: c.terminating,
            }),
            hostname: self.hostname.clone(),
            target_ref: self.target_ref.as_ref().map(|r| ObjectReference {
                kind: r.kind.clone(),
                namespace: r.namespace.clone(),
                name: r.name.clone(),
                uid: r.uid.clone(),
                ..Default::default()
            }),
            node_name: self.node_name.clone(),
            zone: self.zone.clone(),
            hints: self.hints.as_ref().map(|h| discoveryv1::EndpointHints {
                for_zones: Some(
                    h.for_zones
                        .iter()
                        .map(|z| discoveryv1::ForZone {
                            name: z.name.clone(),
                        })
                        .collect(),
                ),
            }),
            ..Default::default()
        }
    }
}

impl PortTemplate {
    /// Copy a discovery/v1 EndpointPort into template form
    pub fn from_discovery(port: &discoveryv1::EndpointPort) -> Self {
        Self {
            name: port.name.clone(),
            protocol: port.protocol.clone(),
            port: port.port,
            app_protocol: port.app_protocol.clone(),
        }
    }

    /// Render the template as a discovery/v1 EndpointPort
    pub fn to_discovery(&self) -> discoveryv1::EndpointPort {
        discoveryv1::EndpointPort {
            name: self.name.clone(),
            protocol: self.protocol.clone(),
            port: self.port,
            app_protocol: self.app_protocol.clone(),
        }
    }
}
