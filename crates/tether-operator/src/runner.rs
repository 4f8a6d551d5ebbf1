//! Controller runner - builds controller futures for each vertical slice
//!
//! Each `build_*` function returns boxed futures the caller composes,
//! keeping controller construction pure and testable.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use tether_common::crd::ShadowEndpointSlice;
use tether_common::REFLECT_LABEL_SELECTOR;

use crate::controller::{self, MapperContext};
use crate::reflect::{self, ReflectContext};

/// Watcher timeout (seconds) - kept under the client read timeout so the
/// API server closes idle watches before the client gives up on them
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the reflection controller future over opted-in EndpointSlices
pub fn build_reflect_controller(
    client: Client,
    ctx: Arc<ReflectContext>,
) -> Vec<Pin<Box<dyn Future<Output = ()> + Send>>> {
    let slices: Api<EndpointSlice> = Api::all(client);

    tracing::info!("- EndpointSlice reflection controller");

    vec![Box::pin(
        Controller::new(
            slices,
            WatcherConfig::default()
                .labels(REFLECT_LABEL_SELECTOR)
                .timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(reflect::reconcile, reflect::error_policy, ctx)
        .for_each(log_reconcile_result("Reflect")),
    )]
}

/// Build the mapping controller future over ShadowEndpointSlices
pub fn build_mapper_controller(
    client: Client,
    ctx: Arc<MapperContext>,
) -> Vec<Pin<Box<dyn Future<Output = ()> + Send>>> {
    let shadows: Api<ShadowEndpointSlice> = Api::all(client);

    tracing::info!("- ShadowEndpointSlice mapping controller");

    vec![Box::pin(
        Controller::new(
            shadows,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(controller::reconcile, controller::error_policy, ctx)
        .for_each(log_reconcile_result("ShadowEndpointSlice")),
    )]
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
