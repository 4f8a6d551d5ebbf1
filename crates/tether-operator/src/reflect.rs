//! Endpoint reflection controller
//!
//! Watches source EndpointSlices that opted into reflection and forges
//! their shadows into the destination tenant namespace. Connection records
//! are listed fresh on every pass - the staleness window is one cycle.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::runtime::reflector::Store;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use tether_common::crd::{is_managed_by_reflection, ShadowEndpointSlice};
use tether_common::events::EventPublisher;
use tether_common::{identity, ClusterId, Error, Result, DESTINATION_CLUSTER_LABEL};
use tether_reflector::{directory, forge, EndpointTranslationEngine, ForgingOpts, StoreNodeDirectory};

/// Field manager for the forged ShadowEndpointSlices
pub const FIELD_MANAGER: &str = "tether-endpoint-reflector";

/// Batch translation applied to non-shortcut endpoints at forge time
pub type DefaultTranslator = dyn Fn(&[String]) -> Vec<String> + Send + Sync;

/// Shared context for the reflection controller
pub struct ReflectContext {
    /// Kubernetes client
    pub client: Client,
    /// Node cache backing ownership lookups
    pub nodes: Store<Node>,
    /// Identity of the cluster this process reflects from, resolved once
    pub local_cluster: ClusterId,
    /// Namespace holding the ClusterConnection records
    pub connections_namespace: String,
    /// Metadata carry-over policy
    pub forging: ForgingOpts,
    /// Forge-time translator; identity unless the deployment remaps early
    pub translator: Arc<DefaultTranslator>,
    /// Event publisher for operator-visible outcomes
    pub events: Arc<dyn EventPublisher>,
}

/// Reconcile one source EndpointSlice into its shadow
#[instrument(skip(slice, ctx), fields(slice = %slice.name_any()))]
pub async fn reconcile(slice: Arc<EndpointSlice>, ctx: Arc<ReflectContext>) -> Result<Action> {
    let name = slice.name_any();

    // Never reflect our own output, even if someone labels it
    if is_managed_by_reflection(&slice.metadata) {
        debug!("slice is managed by reflection, ignoring");
        return Ok(Action::await_change());
    }

    let Some(destination) = slice.labels().get(DESTINATION_CLUSTER_LABEL) else {
        warn!(label = DESTINATION_CLUSTER_LABEL, "reflectable slice has no destination label");
        ctx.events
            .publish(
                &slice.object_ref(&()),
                EventType::Warning,
                "MissingDestination",
                "Reflect",
                Some(format!("label {} is required", DESTINATION_CLUSTER_LABEL)),
            )
            .await;
        return Ok(Action::await_change());
    };
    let destination = ClusterId::new(destination.clone());

    // Fetched fresh per pass; "no topology configured" is distinguishable
    // from "no shortcuts apply" and only the latter is silent
    let records = match directory::list_connections(&ctx.client, &ctx.connections_namespace).await {
        Ok(records) => records,
        Err(e @ Error::Configuration { .. }) => {
            warn!(error = %e, "no topology configured, every address takes the hub path");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let engine = EndpointTranslationEngine::new(ctx.local_cluster.clone(), destination.clone());
    let nodes = StoreNodeDirectory::new(ctx.nodes.clone());
    let target_namespace = identity::tenant_namespace(&destination);

    let shadow = forge::shadow_endpoint_slice(
        &engine,
        &slice,
        &nodes,
        &records,
        &target_namespace,
        |addresses| (ctx.translator)(addresses),
        &ctx.forging,
    );

    let endpoints = shadow.spec.template.endpoints.len();
    let api: Api<ShadowEndpointSlice> = Api::namespaced(ctx.client.clone(), &target_namespace);
    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&shadow),
    )
    .await?;

    info!(cluster = %destination, endpoints, "endpoint slice reflected");
    ctx.events
        .publish(
            &slice.object_ref(&()),
            EventType::Normal,
            "Reflected",
            "Reflect",
            Some(format!(
                "{} endpoints reflected towards {}",
                endpoints, destination
            )),
        )
        .await;

    Ok(Action::requeue(Duration::from_secs(60)))
}

/// Error policy for the reflection controller
pub fn error_policy(slice: Arc<EndpointSlice>, error: &Error, _ctx: Arc<ReflectContext>) -> Action {
    error!(
        ?error,
        slice = %slice.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(30))
    } else {
        Action::await_change()
    }
}
