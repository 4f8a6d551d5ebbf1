//! ShadowEndpointSlice mapping controller
//!
//! The second half of the two-stage hand-off. For every address in a shadow
//! slice, membership in the label-borne shortcut set decides the path:
//! members are already final and are never sent to the IPAM authority;
//! everything else is replaced by the authority's answer. The materialized
//! EndpointSlice is then applied server-side into the same namespace.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use tether_common::crd::{
    shortcut_addresses, EndpointTemplate, ShadowEndpointSlice, ShadowEndpointSliceStatus,
    ShadowPhase,
};
use tether_common::events::EventPublisher;
use tether_common::{identity, ClusterId, Error, Result};

use crate::mapper::AddressMapper;

/// Field manager for the materialized EndpointSlices
pub const FIELD_MANAGER: &str = "tether-shadow-mapper";

/// Shared context for the mapping controller
pub struct MapperContext {
    /// Kubernetes client
    pub client: Client,
    /// The default (hub-path) address mapping authority
    pub mapper: Arc<dyn AddressMapper>,
    /// Event publisher for operator-visible failures
    pub events: Arc<dyn EventPublisher>,
}

/// Apply the default mapping to every address not finalized by a shortcut.
///
/// Addresses are replaced in place; the shortcut set members are skipped
/// untouched. The first mapper failure aborts the pass for this resource -
/// the caller re-queues it as retryable.
pub async fn map_endpoints(
    mapper: &dyn AddressMapper,
    destination: &ClusterId,
    endpoints: &mut [EndpointTemplate],
    shortcut: &HashSet<String>,
) -> Result<()> {
    for endpoint in endpoints.iter_mut() {
        for address in endpoint.addresses.iter_mut() {
            if shortcut.contains(address.as_str()) {
                debug!(address = %address, "address finalized by shortcut, skipping default mapping");
                continue;
            }
            *address = mapper.map(destination, address).await?;
        }
    }
    Ok(())
}

/// Reconcile a ShadowEndpointSlice into a real EndpointSlice
#[instrument(skip(shadow, ctx), fields(shadow = %shadow.name_any()))]
pub async fn reconcile(
    shadow: Arc<ShadowEndpointSlice>,
    ctx: Arc<MapperContext>,
) -> Result<Action> {
    let name = shadow.name_any();
    let namespace = shadow.metadata.namespace.as_deref().ok_or_else(|| {
        Error::configuration_in("mapper", "ShadowEndpointSlice missing namespace")
    })?;

    // At most one mapping pass per generation
    if is_status_current(&shadow) {
        debug!("generation already mapped, skipping");
        return Ok(Action::requeue(Duration::from_secs(300)));
    }

    // The tenant namespace names the destination cluster
    let destination = identity::cluster_from_tenant_namespace(namespace)?;
    let shortcut = shortcut_addresses(&shadow.metadata);

    info!(cluster = %destination, shortcuts = shortcut.len(), "mapping shadow endpoint slice");

    let mut endpoints = shadow.spec.template.endpoints.clone();
    if let Err(e) = map_endpoints(ctx.mapper.as_ref(), &destination, &mut endpoints, &shortcut).await
    {
        warn!(error = %e, "default address mapping failed");
        ctx.events
            .publish(
                &shadow.object_ref(&()),
                EventType::Warning,
                "MappingFailed",
                "Map",
                Some(e.to_string()),
            )
            .await;
        patch_status(
            &ctx.client,
            &name,
            namespace,
            ShadowEndpointSliceStatus::default()
                .phase(ShadowPhase::Failed)
                .message(e.to_string()),
        )
        .await?;
        return Err(e);
    }

    let slice = materialize(&shadow, endpoints);
    let api: Api<EndpointSlice> = Api::namespaced(ctx.client.clone(), namespace);
    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&slice),
    )
    .await?;

    patch_status(
        &ctx.client,
        &name,
        namespace,
        ShadowEndpointSliceStatus::default()
            .phase(ShadowPhase::Ready)
            .observed_generation(shadow.metadata.generation),
    )
    .await?;

    info!("shadow endpoint slice materialized");
    Ok(Action::requeue(Duration::from_secs(300)))
}

/// Error policy for the mapping controller: retryable errors back off,
/// permanent ones await a spec change
pub fn error_policy(
    shadow: Arc<ShadowEndpointSlice>,
    error: &Error,
    _ctx: Arc<MapperContext>,
) -> Action {
    error!(
        ?error,
        shadow = %shadow.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(30))
    } else {
        Action::await_change()
    }
}

/// Whether the current generation has already been mapped successfully
fn is_status_current(shadow: &ShadowEndpointSlice) -> bool {
    shadow
        .status
        .as_ref()
        .is_some_and(|status| {
            status.phase == ShadowPhase::Ready
                && status.observed_generation == shadow.metadata.generation
        })
}

/// Render the mapped template as the EndpointSlice to apply
fn materialize(shadow: &ShadowEndpointSlice, endpoints: Vec<EndpointTemplate>) -> EndpointSlice {
    EndpointSlice {
        metadata: kube::api::ObjectMeta {
            name: shadow.metadata.name.clone(),
            namespace: shadow.metadata.namespace.clone(),
            labels: shadow.metadata.labels.clone(),
            ..Default::default()
        },
        address_type: shadow.spec.template.address_type.clone(),
        endpoints: endpoints.iter().map(EndpointTemplate::to_discovery).collect(),
        ports: (!shadow.spec.template.ports.is_empty()).then(|| {
            shadow
                .spec
                .template
                .ports
                .iter()
                .map(|p| p.to_discovery())
                .collect()
        }),
    }
}

async fn patch_status(
    client: &Client,
    name: &str,
    namespace: &str,
    status: ShadowEndpointSliceStatus,
) -> Result<()> {
    let api: Api<ShadowEndpointSlice> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
