//! Endpoint translation core for Tether
//!
//! Turns a source cluster's EndpointSlices into ShadowEndpointSlices for a
//! destination cluster. Per address, the pipeline decides which remapping
//! path applies: addresses inside a shortcut-eligible range are relocated
//! into the shortcut CIDR here and recorded in the hand-off label; every
//! other address is left for the hub-path mapping pass that runs later.

#![deny(missing_docs)]

pub mod directory;
pub mod filter;
pub mod forge;
pub mod shortcut;
pub mod translate;

pub use filter::{should_reflect, NodeDirectory, ReflectionVerdict, StoreNodeDirectory};
pub use forge::{shadow_endpoint_slice, ForgingOpts};
pub use translate::{EndpointTranslationEngine, TranslationOutcome};
