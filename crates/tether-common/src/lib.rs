//! Common types for Tether: CRDs, errors, identity, and CIDR arithmetic

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod identity;
pub mod net;
pub mod telemetry;

pub use error::Error;
pub use identity::ClusterId;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace for Tether system resources (connection records, operator)
pub const TETHER_SYSTEM_NAMESPACE: &str = "tether-system";

/// Node label naming the cluster a node belongs to in the topology
pub const REMOTE_CLUSTER_ID_LABEL: &str = "tether.dev/remote-cluster-id";

/// Label key opting an EndpointSlice into reflection
pub const REFLECT_LABEL_KEY: &str = "tether.dev/reflect";

/// Label selector for reflectable EndpointSlices (for Kubernetes API queries)
pub const REFLECT_LABEL_SELECTOR: &str = "tether.dev/reflect=true";

/// Label key naming the cluster an EndpointSlice is reflected towards
pub const DESTINATION_CLUSTER_LABEL: &str = "tether.dev/destination-cluster";
