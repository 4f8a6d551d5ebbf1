//! Tether operator library
//!
//! Two controllers cooperate through the shortcut-addresses label and
//! nothing else. The reflection controller watches opted-in source
//! EndpointSlices and forges ShadowEndpointSlices into destination tenant
//! namespaces; the mapping controller watches the shadows and materializes
//! them as real EndpointSlices, asking the IPAM authority for a routable
//! address for everything the shortcut path did not already finalize.

#![deny(missing_docs)]

pub mod controller;
pub mod mapper;
pub mod reflect;
pub mod runner;

pub use mapper::{AddressMapper, HttpAddressMapper};
