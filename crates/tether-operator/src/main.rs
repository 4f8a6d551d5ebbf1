//! Tether operator - multi-cluster endpoint reflection

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::reflector;
use kube::runtime::watcher;
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, CustomResourceExt};
use tracing::{info, warn};

use tether_common::crd::{ClusterConnection, ShadowEndpointSlice};
use tether_common::events::KubeEventPublisher;
use tether_common::telemetry::{init_telemetry, TelemetryConfig};
use tether_common::{identity, ClusterId, TETHER_SYSTEM_NAMESPACE};
use tether_operator::controller::MapperContext;
use tether_operator::reflect::ReflectContext;
use tether_operator::runner::{build_mapper_controller, build_reflect_controller};
use tether_operator::HttpAddressMapper;
use tether_reflector::ForgingOpts;

/// Tether - endpoint reflection across a hub-and-shortcut cluster topology
#[derive(Parser, Debug)]
#[command(name = "tether-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Identity of the local cluster; derived from POD_NAMESPACE when unset
    #[arg(long, env = "TETHER_CLUSTER_NAME")]
    cluster_name: Option<String>,

    /// Base endpoint of the IPAM mapping authority
    #[arg(long, env = "TETHER_IPAM_ENDPOINT")]
    ipam_endpoint: Option<String>,

    /// Namespace holding the ClusterConnection records
    #[arg(long, env = "TETHER_CONNECTIONS_NAMESPACE", default_value = TETHER_SYSTEM_NAMESPACE)]
    connections_namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let connection = serde_yaml::to_string(&ClusterConnection::crd())?;
        let shadow = serde_yaml::to_string(&ShadowEndpointSlice::crd())?;
        println!("{connection}---\n{shadow}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "tether-operator".to_string(),
        ..Default::default()
    })?;

    // The local cluster identity is resolved exactly once, here, and passed
    // into the controllers as an explicit value. A namespace that does not
    // follow the tenant convention is a configuration error, not an empty
    // identity.
    let local_cluster = match cli.cluster_name {
        Some(name) => ClusterId::new(name),
        None => {
            let namespace = std::env::var("POD_NAMESPACE")
                .map_err(|_| anyhow::anyhow!("set TETHER_CLUSTER_NAME or POD_NAMESPACE"))?;
            identity::cluster_from_tenant_namespace(&namespace)?
        }
    };
    info!(cluster = %local_cluster, "resolved local cluster identity");

    let ipam_endpoint = cli.ipam_endpoint.ok_or_else(|| {
        anyhow::anyhow!("TETHER_IPAM_ENDPOINT must point at the default mapping authority")
    })?;

    let client = Client::try_default().await?;
    ensure_crds_installed(&client).await?;

    // Node cache backing the reflection filter's ownership lookups
    let nodes: Api<Node> = Api::all(client.clone());
    let (store, writer) = reflector::store();
    let node_watch = reflector::reflector(writer, watcher(nodes, watcher::Config::default()))
        .default_backoff()
        .touched_objects()
        .for_each(|result| async {
            if let Err(e) = result {
                warn!(error = %e, "node watch error");
            }
        });
    tokio::spawn(node_watch);
    store
        .wait_until_ready()
        .await
        .map_err(|e| anyhow::anyhow!("node cache failed to sync: {e}"))?;
    info!("node cache ready");

    let reflect_ctx = Arc::new(ReflectContext {
        client: client.clone(),
        nodes: store,
        local_cluster,
        connections_namespace: cli.connections_namespace,
        forging: ForgingOpts {
            labels_not_reflected: vec![tether_common::REFLECT_LABEL_KEY.to_string()],
            annotations_not_reflected: vec![],
        },
        translator: Arc::new(|addresses| addresses.to_vec()),
        events: Arc::new(KubeEventPublisher::new(
            client.clone(),
            "tether-endpoint-reflector",
        )),
    });

    let mapper_ctx = Arc::new(MapperContext {
        client: client.clone(),
        mapper: Arc::new(HttpAddressMapper::new(ipam_endpoint)),
        events: Arc::new(KubeEventPublisher::new(client.clone(), "tether-shadow-mapper")),
    });

    info!("starting controllers:");
    let mut controllers = build_reflect_controller(client.clone(), reflect_ctx);
    controllers.extend(build_mapper_controller(client, mapper_ctx));

    futures::future::join_all(controllers).await;

    Ok(())
}

/// Ensure the Tether CRDs are installed
///
/// The operator installs its own CRDs on startup using server-side apply,
/// so the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply("tether-operator").force();

    info!("installing ClusterConnection CRD");
    crds.patch(
        "clusterconnections.tether.dev",
        &params,
        &Patch::Apply(&ClusterConnection::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to install ClusterConnection CRD: {e}"))?;

    info!("installing ShadowEndpointSlice CRD");
    crds.patch(
        "shadowendpointslices.tether.dev",
        &params,
        &Patch::Apply(&ShadowEndpointSlice::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to install ShadowEndpointSlice CRD: {e}"))?;

    Ok(())
}
