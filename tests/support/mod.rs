// ABOUTME: Shared test fixtures: an in-memory mock container runtime.
// ABOUTME: Tracks images, containers, and networks with failure injection.

#![allow(dead_code)]

use async_trait::async_trait;
use gantry::manifest::Manifest;
use gantry::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerOps, ContainerState,
    ContainerSummary, ImageError, ImageOps, NetworkError, NetworkFilters, NetworkOps, NetworkSpec,
    NetworkSummary, RegistryAuth,
};
use gantry::types::{ContainerId, ImageId, ImageRef, NetworkId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// An in-memory stand-in for a container engine. Cloning shares state, so
/// tests keep a handle for assertions while the orchestrator owns another.
#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Locally present images, keyed by normalized reference.
    images: HashMap<String, ImageId>,
    containers: Vec<MockContainer>,
    networks: Vec<MockNetwork>,
    /// Record of every pull, in order.
    pulls: Vec<String>,
    /// Monotonic stamp for network creation ordering.
    clock: u64,
    next_container: u64,
    next_network: u64,
    fail_pull: HashSet<String>,
    fail_start: HashSet<String>,
    fail_stop: HashSet<String>,
    fail_remove: HashSet<String>,
    hang_on_pull: bool,
}

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub image_id: ImageId,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockNetwork {
    pub id: NetworkId,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub created: u64,
}

/// Deterministic image ID derivation shared by every path that touches an
/// image, so refcounting by ID works.
fn image_id_of(reference: &str) -> ImageId {
    ImageId::new(format!("sha256:{}", reference))
}

fn normalize(reference: &str) -> String {
    ImageRef::parse(reference)
        .expect("test image reference must parse")
        .to_string()
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding and failure injection
    // ------------------------------------------------------------------

    /// Mark an image as already present on the host.
    pub fn seed_image(&self, reference: &str) {
        let reference = normalize(reference);
        let id = image_id_of(&reference);
        self.state.lock().images.insert(reference, id);
    }

    /// Add a container outside any manifest's label scope, referencing the
    /// given image. Used to exercise shared-image retention.
    pub fn add_external_container(&self, name: &str, reference: &str) {
        let reference = normalize(reference);
        let mut state = self.state.lock();
        state.next_container += 1;
        let id = ContainerId::new(format!("ctr-{}", state.next_container));
        state.containers.push(MockContainer {
            id,
            name: name.to_string(),
            image: reference.clone(),
            image_id: image_id_of(&reference),
            state: ContainerState::Running,
            labels: HashMap::new(),
            network: None,
        });
    }

    pub fn fail_pull_of(&self, reference: &str) {
        self.state.lock().fail_pull.insert(normalize(reference));
    }

    pub fn fail_start_of(&self, container_name: &str) {
        self.state
            .lock()
            .fail_start
            .insert(container_name.to_string());
    }

    pub fn fail_stop_of(&self, container_name: &str) {
        self.state
            .lock()
            .fail_stop
            .insert(container_name.to_string());
    }

    pub fn fail_remove_of(&self, container_name: &str) {
        self.state
            .lock()
            .fail_remove
            .insert(container_name.to_string());
    }

    /// Make every pull block forever, for timeout tests.
    pub fn hang_on_pull(&self) {
        self.state.lock().hang_on_pull = true;
    }

    // ------------------------------------------------------------------
    // Assertion helpers
    // ------------------------------------------------------------------

    pub fn containers(&self) -> Vec<MockContainer> {
        self.state.lock().containers.clone()
    }

    pub fn networks(&self) -> Vec<MockNetwork> {
        self.state.lock().networks.clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().pulls.clone()
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.state.lock().images.contains_key(&normalize(reference))
    }
}

#[async_trait]
impl ImageOps for MockRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let hang = self.state.lock().hang_on_pull;
        if hang {
            futures::future::pending::<()>().await;
        }

        let reference = reference.to_string();
        let mut state = self.state.lock();
        if state.fail_pull.contains(&reference) {
            return Err(ImageError::PullFailed(reference));
        }
        state.pulls.push(reference.clone());
        let id = image_id_of(&reference);
        state.images.insert(reference, id);
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self
            .state
            .lock()
            .images
            .contains_key(&reference.to_string()))
    }

    async fn remove_image(&self, id: &ImageId, _force: bool) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if state.containers.iter().any(|c| &c.image_id == id) {
            return Err(ImageError::InUse(id.to_string()));
        }
        state.images.retain(|_, image_id| image_id != id);
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for MockRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();

        if state.containers.iter().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }

        let reference = config.image.to_string();
        if !state.images.contains_key(&reference) {
            return Err(ContainerError::ImageNotFound(reference));
        }

        state.next_container += 1;
        let id = ContainerId::new(format!("ctr-{}", state.next_container));
        state.containers.push(MockContainer {
            id: id.clone(),
            name: config.name.clone(),
            image: reference.clone(),
            image_id: image_id_of(&reference),
            state: ContainerState::Created,
            labels: config.labels.clone(),
            network: config.network.clone(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let fail_start = state.fail_start.clone();
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if fail_start.contains(&container.name) {
            return Err(ContainerError::Runtime(format!(
                "injected start failure for {}",
                container.name
            )));
        }
        if container.state == ContainerState::Running {
            return Err(ContainerError::AlreadyRunning(container.name.clone()));
        }
        container.state = ContainerState::Running;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let fail_stop = state.fail_stop.clone();
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if fail_stop.contains(&container.name) {
            return Err(ContainerError::Runtime(format!(
                "injected stop failure for {}",
                container.name
            )));
        }
        if container.state != ContainerState::Running {
            return Err(ContainerError::NotRunning(container.name.clone()));
        }
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let Some(index) = state.containers.iter().position(|c| &c.id == id) else {
            return Err(ContainerError::NotFound(id.to_string()));
        };
        if state.fail_remove.contains(&state.containers[index].name) {
            return Err(ContainerError::Runtime(format!(
                "injected remove failure for {}",
                state.containers[index].name
            )));
        }
        state.containers.remove(index);
        Ok(())
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .filter(|c| filters.all || c.state == ContainerState::Running)
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![c.name.clone()],
                image: c.image.clone(),
                image_id: c.image_id.clone(),
                state: c.state,
                status: format!("{:?}", c.state),
                labels: c.labels.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for MockRuntime {
    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkId, NetworkError> {
        let mut state = self.state.lock();
        if state.networks.iter().any(|n| n.name == spec.name) {
            return Err(NetworkError::AlreadyExists(spec.name.clone()));
        }
        state.next_network += 1;
        state.clock += 1;
        let id = NetworkId::new(format!("net-{}", state.next_network));
        let created = state.clock;
        state.networks.push(MockNetwork {
            id: id.clone(),
            name: spec.name.clone(),
            labels: spec.labels.clone(),
            created,
        });
        Ok(id)
    }

    async fn list_networks(
        &self,
        filters: &NetworkFilters,
    ) -> Result<Vec<NetworkSummary>, NetworkError> {
        let state = self.state.lock();
        Ok(state
            .networks
            .iter()
            .filter(|n| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| n.labels.get(k) == Some(v))
            })
            .map(|n| NetworkSummary {
                id: n.id.clone(),
                name: n.name.clone(),
                created: n.created.to_string(),
                labels: n.labels.clone(),
            })
            .collect())
    }

    async fn prune_networks(&self, filters: &NetworkFilters) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        // Like the engine's prune: only unused networks go.
        let in_use: HashSet<String> = state
            .containers
            .iter()
            .filter_map(|c| c.network.clone())
            .collect();
        state.networks.retain(|n| {
            let matches = filters
                .labels
                .iter()
                .all(|(k, v)| n.labels.get(k) == Some(v));
            !matches || in_use.contains(&n.name)
        });
        Ok(())
    }
}

/// A minimal two-field manifest document with the given modules, each running
/// an image named after the module.
pub fn manifest_json(name: &str, version: &str, modules: &[&str]) -> String {
    let modules: Vec<serde_json::Value> = modules
        .iter()
        .map(|module| {
            serde_json::json!({
                "name": module,
                "image": { "name": format!("registry.example.com/{}", module), "tag": "1.0" },
            })
        })
        .collect();

    serde_json::json!({
        "id": format!("{}-{}", name, version),
        "applicationId": "app-1",
        "manifestName": name,
        "versionNumber": version,
        "modules": modules,
    })
    .to_string()
}

/// Parse a manifest document the way the command surface does.
pub fn manifest(name: &str, version: &str, modules: &[&str]) -> Manifest {
    Manifest::from_json(&manifest_json(name, version, modules)).expect("test manifest must parse")
}

/// The image reference a module of `manifest()` runs.
pub fn module_image(module: &str) -> String {
    format!("registry.example.com/{}:1.0", module)
}
