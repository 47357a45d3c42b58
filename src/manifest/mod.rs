// ABOUTME: Typed manifest model for data services.
// ABOUTME: Identity, parse/validate, and per-module container config derivation.

mod id;
mod model;

pub use id::ManifestUniqueId;
pub use model::{
    ImageSpec, Manifest, ManifestError, Module, ModuleMount, ModulePort, ModuleResources,
    RegistrySpec,
};
pub(crate) use model::sanitize_name;

/// Label stamped on every resource this agent manages.
pub const LABEL_MANAGED: &str = "gantry.managed";
/// Label carrying the manifest name half of the identity.
pub const LABEL_MANIFEST: &str = "gantry.manifest";
/// Label carrying the version half of the identity.
pub const LABEL_VERSION: &str = "gantry.version";
