// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, remove, and list containers by label.

use super::shared_types::{ContainerConfig, ContainerState};
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// List containers matching the given filters. An empty filter with
    /// `all` set enumerates every container on the host.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Filter on a label set, including non-running containers.
    pub fn by_labels(labels: HashMap<String, String>) -> Self {
        Self { labels, all: true }
    }

    /// Every container on the host, running or not. Used by the undeploy
    /// image sweep to count remaining references to an image.
    pub fn everything() -> Self {
        Self {
            labels: HashMap::new(),
            all: true,
        }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container names (engines may report several).
    pub names: Vec<String>,
    /// Image reference the container was created from.
    pub image: String,
    /// Resolved image ID; the undeploy sweep refcounts on this.
    pub image_id: ImageId,
    /// Current state.
    pub state: ContainerState,
    /// Human-readable status line.
    pub status: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Primary display name.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
