// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Create, list, and prune service networks by label.

use super::shared_types::NetworkSpec;
use crate::types::NetworkId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Network operations: create, list, prune.
#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Create a network.
    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkId, NetworkError>;

    /// List networks matching the given filters.
    async fn list_networks(
        &self,
        filters: &NetworkFilters,
    ) -> Result<Vec<NetworkSummary>, NetworkError>;

    /// Remove all unused networks matching the given filters.
    async fn prune_networks(&self, filters: &NetworkFilters) -> Result<(), NetworkError>;
}

/// Label filters for network queries.
#[derive(Debug, Clone, Default)]
pub struct NetworkFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
}

impl NetworkFilters {
    pub fn by_labels(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }
}

/// Summary information about a network.
#[derive(Debug, Clone)]
pub struct NetworkSummary {
    /// Network ID.
    pub id: NetworkId,
    /// Network name.
    pub name: String,
    /// Creation timestamp as reported by the engine (RFC 3339).
    pub created: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("network in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
