// ABOUTME: Manifest and Module structs with serde parsing and validation.
// ABOUTME: Derives one runtime ContainerConfig per module after network assignment.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::runtime::{
    ContainerConfig, PortMapping, Protocol, RegistryAuth, ResourceLimits, RestartPolicyConfig,
    VolumeMount,
};
use crate::types::{ImageRef, ParseImageRefError};

use super::ManifestUniqueId;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest name cannot be empty")]
    MissingName,

    #[error("version number cannot be empty")]
    MissingVersion,

    #[error("manifest must declare at least one module")]
    EmptyModules,

    #[error("module at index {0} has no name")]
    ModuleMissingName(usize),

    #[error("module name is not unique within the manifest: {0}")]
    DuplicateModuleName(String),

    #[error("invalid image reference: {0}")]
    InvalidImage(#[from] ParseImageRefError),

    #[error("no network assigned to manifest {0}; deploy must create the network first")]
    NetworkNotAssigned(ManifestUniqueId),
}

/// Declarative description of a data service: identity plus the list of
/// modules to run as containers on one shared network.
///
/// Immutable once parsed for a given deployment attempt, except for the
/// network name, which deployment assigns via [`Manifest::assign_network`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Backend-assigned manifest document ID.
    #[serde(default)]
    pub id: String,

    /// Application this service belongs to.
    #[serde(default)]
    pub application_id: String,

    #[serde(flatten)]
    pub unique_id: ManifestUniqueId,

    /// Free-form labels from the manifest author, applied to every resource.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub modules: Vec<Module>,

    /// Driver for the service network.
    #[serde(default = "default_network_driver")]
    pub network_driver: String,

    /// Assigned during deployment, never present in the manifest document.
    #[serde(skip)]
    network_name: Option<String>,
}

/// One module of a data service, deployed as one container.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub name: String,

    pub image: ImageSpec,

    /// Entry point arguments (overrides the image CMD).
    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub ports: Vec<ModulePort>,

    #[serde(default)]
    pub mounts: Vec<ModuleMount>,

    #[serde(default)]
    pub resources: Option<ModuleResources>,
}

/// Image coordinates as manifests carry them: separate name/tag/registry
/// fields rather than a flat reference string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub registry: Option<RegistrySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePort {
    #[serde(default)]
    pub host: Option<u16>,
    pub container: u16,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMount {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResources {
    /// Memory limit in bytes.
    #[serde(default)]
    pub memory: Option<u64>,
    /// CPU quota (1.0 = 1 CPU).
    #[serde(default)]
    pub cpus: Option<f64>,
}

fn default_network_driver() -> String {
    "bridge".to_string()
}

impl Module {
    /// Full image reference for pull/exists checks and container creation.
    pub fn image_ref(&self) -> Result<ImageRef, ParseImageRefError> {
        let registry = self.image.registry.as_ref().and_then(|r| r.url.as_deref());
        ImageRef::from_parts(registry, &self.image.name, self.image.tag.as_deref())
    }

    /// Registry credentials, when the manifest carries them.
    pub fn registry_auth(&self) -> Option<RegistryAuth> {
        let registry = self.image.registry.as_ref()?;
        let username = registry.user_name.clone()?;
        Some(RegistryAuth {
            username,
            password: registry.password.clone().unwrap_or_default(),
            server: registry.url.clone(),
        })
    }
}

impl Manifest {
    /// Parse a manifest document and validate its shape.
    pub fn from_json(input: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(input)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Structural validation. The orchestrator assumes this already ran;
    /// it re-checks only the empty-module case because that failure must
    /// roll back a partially created deployment.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.unique_id.manifest_name.is_empty() {
            return Err(ManifestError::MissingName);
        }
        if self.unique_id.version_number.is_empty() {
            return Err(ManifestError::MissingVersion);
        }
        if self.modules.is_empty() {
            return Err(ManifestError::EmptyModules);
        }

        let mut seen = HashSet::new();
        for (index, module) in self.modules.iter().enumerate() {
            if module.name.is_empty() {
                return Err(ManifestError::ModuleMissingName(index));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(ManifestError::DuplicateModuleName(module.name.clone()));
            }
            module.image_ref()?;
        }

        Ok(())
    }

    /// Record the network created for this deployment. All container configs
    /// derived afterwards reference it.
    pub fn assign_network(&mut self, name: impl Into<String>) {
        self.network_name = Some(name.into());
    }

    pub fn network_name(&self) -> Option<&str> {
        self.network_name.as_deref()
    }

    /// Labels applied to every container and the network: author labels
    /// overlaid with the identity labels and the managed marker.
    pub fn effective_labels(&self) -> HashMap<String, String> {
        let mut labels = self.labels.clone();
        labels.extend(self.unique_id.labels());
        labels
    }

    /// Container name for a module, unique within the manifest version.
    pub fn container_name(&self, module: &Module) -> String {
        sanitize_name(&format!(
            "{}-{}-{}",
            self.unique_id.manifest_name, self.unique_id.version_number, module.name
        ))
    }

    /// Derive one runtime container config per module, in manifest order.
    ///
    /// Fails if no network has been assigned yet; the derived configs always
    /// carry the manifest's network.
    pub fn container_configs(&self) -> Result<Vec<ContainerConfig>, ManifestError> {
        let network = self
            .network_name
            .clone()
            .ok_or_else(|| ManifestError::NetworkNotAssigned(self.unique_id.clone()))?;

        let labels = self.effective_labels();

        self.modules
            .iter()
            .map(|module| {
                let ports = module
                    .ports
                    .iter()
                    .map(|p| PortMapping {
                        host_port: p.host,
                        container_port: p.container,
                        protocol: match p.protocol.as_deref() {
                            Some("udp") => Protocol::Udp,
                            _ => Protocol::Tcp,
                        },
                        host_ip: None,
                    })
                    .collect();

                let mounts = module
                    .mounts
                    .iter()
                    .map(|m| VolumeMount {
                        source: m.source.clone(),
                        target: m.target.clone(),
                        read_only: m.read_only,
                    })
                    .collect();

                Ok(ContainerConfig {
                    name: self.container_name(module),
                    image: module.image_ref()?,
                    env: module.env.clone(),
                    labels: labels.clone(),
                    ports,
                    mounts,
                    command: module.command.clone(),
                    entrypoint: None,
                    // Edge modules are expected to ride out transient crashes.
                    restart_policy: RestartPolicyConfig::OnFailure {
                        max_retries: Some(100),
                    },
                    resources: module.resources.as_ref().map(|r| ResourceLimits {
                        memory: r.memory,
                        cpus: r.cpus,
                    }),
                    network: Some(network.clone()),
                    network_driver: Some(self.network_driver.clone()),
                })
            })
            .collect()
    }
}

/// Make a string safe as a Docker container or network name: the first
/// character must be alphanumeric, the rest `[a-zA-Z0-9_.-]`.
pub(crate) fn sanitize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || (!out.is_empty() && (c == '_' || c == '.' || c == '-')) {
            out.push(c);
        } else if !out.is_empty() {
            out.push('-');
        }
    }
    out
}
