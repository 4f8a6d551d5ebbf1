//! Shadow resource forging
//!
//! Builds the ShadowEndpointSlice for a destination cluster out of a local
//! EndpointSlice: translated endpoints, ports carried over as copies, and
//! object metadata rebuilt under the reflection manager label. When the
//! translation finalized any address over a shortcut, the set is serialized
//! onto the `tether.dev/shortcut-addresses` label - the only state shared
//! with the later mapping pass.

use std::collections::BTreeMap;

use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use tether_common::crd::{
    encode_shortcut_addresses, reflection_labels, EndpointSliceTemplate, PortTemplate,
    ShadowEndpointSlice, ShadowEndpointSliceSpec, SHORTCUT_ADDRESSES_LABEL,
};

use crate::filter::NodeDirectory;
use crate::translate::EndpointTranslationEngine;
use tether_common::crd::ClusterConnection;

/// Metadata carry-over policy: labels and annotations never copied onto the
/// shadow resource
#[derive(Clone, Debug, Default)]
pub struct ForgingOpts {
    /// Label keys excluded from reflection
    pub labels_not_reflected: Vec<String>,
    /// Annotation keys excluded from reflection
    pub annotations_not_reflected: Vec<String>,
}

/// Forge the shadow of a local EndpointSlice for the engine's destination.
///
/// Connection records are supplied fresh by the caller; the forge never
/// caches them.
pub fn shadow_endpoint_slice<F>(
    engine: &EndpointTranslationEngine,
    local: &EndpointSlice,
    nodes: &dyn NodeDirectory,
    records: &[ClusterConnection],
    target_namespace: &str,
    default_translator: F,
    opts: &ForgingOpts,
) -> ShadowEndpointSlice
where
    F: Fn(&[String]) -> Vec<String>,
{
    let outcome = engine.translate(&local.endpoints, nodes, records, default_translator);

    let mut labels = filter_not_reflected(local.labels(), &opts.labels_not_reflected);
    labels.extend(reflection_labels());
    if !outcome.shortcut_addresses.is_empty() {
        labels.insert(
            SHORTCUT_ADDRESSES_LABEL.to_string(),
            encode_shortcut_addresses(&outcome.shortcut_addresses),
        );
    }

    let annotations = filter_not_reflected(local.annotations(), &opts.annotations_not_reflected);

    ShadowEndpointSlice {
        metadata: ObjectMeta {
            name: Some(local.name_any()),
            namespace: Some(target_namespace.to_string()),
            labels: Some(labels),
            annotations: (!annotations.is_empty()).then_some(annotations),
            ..Default::default()
        },
        spec: ShadowEndpointSliceSpec {
            template: EndpointSliceTemplate {
                address_type: local.address_type.clone(),
                endpoints: outcome.endpoints,
                ports: local
                    .ports
                    .iter()
                    .flatten()
                    .map(PortTemplate::from_discovery)
                    .collect(),
            },
        },
        status: None,
    }
}

/// Copy a label/annotation map minus the excluded keys
fn filter_not_reflected(
    source: &BTreeMap<String, String>,
    excluded: &[String],
) -> BTreeMap<String, String> {
    source
        .iter()
        .filter(|(key, _)| !excluded.iter().any(|e| e == *key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
