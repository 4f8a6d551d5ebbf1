//! Connection directory queries
//!
//! ClusterConnection records are fetched fresh on every translation call -
//! no cache sits between the directory and the resolver, so the staleness
//! window equals one reflection cycle.

use kube::api::ListParams;
use kube::{Api, Client};
use tracing::instrument;

use tether_common::crd::{CidrPair, ClusterConnection};
use tether_common::{ClusterId, Error, Result};

/// List the ClusterConnection records in a namespace.
///
/// An empty list is an error, not an empty success: callers need to
/// distinguish "no topology configured" from "no shortcuts apply".
#[instrument(skip(client))]
pub async fn list_connections(client: &Client, namespace: &str) -> Result<Vec<ClusterConnection>> {
    let api: Api<ClusterConnection> = Api::namespaced(client.clone(), namespace);
    let list = api.list(&ListParams::default()).await?;

    if list.items.is_empty() {
        return Err(Error::configuration_in(
            "directory",
            format!("no ClusterConnection records in namespace {}", namespace),
        ));
    }

    Ok(list.items)
}

/// The CIDR pairs the records contribute for `cluster`, in directory order.
///
/// A record matches on either side; an address is later tested against the
/// pairs in exactly this order, first match wins. No record referencing the
/// cluster is an error.
pub fn cidrs_for_cluster(
    records: &[ClusterConnection],
    cluster: &ClusterId,
) -> Result<Vec<CidrPair>> {
    let pairs: Vec<CidrPair> = records
        .iter()
        .filter_map(|record| record.cidr_pair_for(cluster))
        .collect();

    if pairs.is_empty() {
        return Err(Error::configuration_in(
            "directory",
            format!("no ClusterConnection references cluster {}", cluster),
        ));
    }

    Ok(pairs)
}
