//! Custom Resource Definitions for Tether
//!
//! `ClusterConnection` records the per-pair networking topology (hub-observed
//! and shortcut CIDRs); `ShadowEndpointSlice` is the reflected, translated
//! copy of a source cluster's endpoint list handed to a destination cluster.

mod connection;
mod shadow;

pub use connection::{
    CidrPair, ClusterConnection, ClusterConnectionSpec, ClusterConnectionStatus,
    ConnectionNetworking,
};
pub use shadow::{
    encode_shortcut_addresses, is_managed_by_reflection, reflection_labels, shortcut_addresses,
    ConditionsTemplate, EndpointSliceTemplate, EndpointTemplate, ForZone, HintsTemplate,
    PortTemplate, ShadowEndpointSlice, ShadowEndpointSliceSpec, ShadowEndpointSliceStatus,
    ShadowPhase, TargetRef, ENDPOINT_SLICE_MANAGED_BY, MANAGED_BY_LABEL, SHORTCUT_ADDRESSES_LABEL,
};
