//! Default address mapping authority client
//!
//! The hub-path authority ("IPAM") assigns the final routable address for
//! every non-shortcut address. It is a remote service: calls may fail or
//! time out, and failures are surfaced as retryable so the reconciliation
//! loop re-queues the resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tether_common::{ClusterId, Error, Result};

/// Assigns final routable addresses for non-shortcut traffic
#[async_trait]
pub trait AddressMapper: Send + Sync {
    /// Map `address` for consumption by `destination`.
    ///
    /// Implementations must honor the caller's cancellation (dropping the
    /// future aborts the call) and surface failures as remote errors.
    async fn map(&self, destination: &ClusterId, address: &str) -> Result<String>;
}

/// HTTP client against the IPAM authority's mapping endpoint
pub struct HttpAddressMapper {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAddressMapper {
    /// Create a mapper against the given base endpoint (e.g.
    /// "http://tether-ipam.tether-system:8080")
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct MapRequest<'a> {
    cluster: &'a str,
    address: &'a str,
}

#[derive(Deserialize)]
struct MapResponse {
    address: String,
}

#[async_trait]
impl AddressMapper for HttpAddressMapper {
    async fn map(&self, destination: &ClusterId, address: &str) -> Result<String> {
        let url = format!("{}/map", self.endpoint.trim_end_matches('/'));
        let request = MapRequest {
            cluster: destination.as_str(),
            address,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::remote("ipam", format!("map request for {address}: {e}")))?
            .error_for_status()
            .map_err(|e| Error::remote("ipam", format!("map request for {address}: {e}")))?;

        let body: MapResponse = response
            .json()
            .await
            .map_err(|e| Error::remote("ipam", format!("invalid map response: {e}")))?;

        Ok(body.address)
    }
}
