// ABOUTME: The lifecycle state machine for data services.
// ABOUTME: Deploy, stop, start, undeploy, remove; rollback via teardown.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::ledger::{ServiceStatus, StatusLedger};
use crate::manifest::{Manifest, ManifestUniqueId, sanitize_name};
use crate::runtime::{
    ContainerFilters, ContainerRuntime, ContainerState, NetworkFilters, NetworkSpec,
};

use super::command::{Command, DeployKind};
use super::error::DeployError;

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Grace period given to a container before the engine kills it.
    pub stop_timeout: Duration,
    /// Optional ceiling on each individual runtime call.
    pub call_timeout: Option<Duration>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(30),
            call_timeout: None,
        }
    }
}

/// Drives data service lifecycles against a container runtime, recording
/// every outcome in the status ledger.
///
/// The orchestrator performs no locking; operations against one identity
/// must be serialized by the caller (see [`super::IdentityLocks`]).
/// Operations against different identities are independent.
pub struct Orchestrator<R> {
    runtime: R,
    ledger: Arc<StatusLedger>,
    options: OrchestratorOptions,
}

impl<R: ContainerRuntime> Orchestrator<R> {
    pub fn new(runtime: R, ledger: Arc<StatusLedger>, options: OrchestratorOptions) -> Self {
        Self {
            runtime,
            ledger,
            options,
        }
    }

    pub fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    // =========================================================================
    // Deploy
    // =========================================================================

    /// Deploy a manifest. `Redeploy` and `LocalDeploy` reclaim an existing
    /// deployment first; plain `Deploy` refuses to touch one.
    pub async fn deploy(
        &self,
        mut manifest: Manifest,
        kind: DeployKind,
    ) -> Result<(), DeployError> {
        let command = kind.command();
        let id = manifest.unique_id.clone();
        let module_count = manifest.modules.len();

        info!(manifest = %id, %command, "deploying data service");

        // Existence check is read-only: a plain deploy against a live
        // service must leave the ledger untouched.
        let exists = match self.service_exists(&id).await {
            Ok(exists) => exists,
            Err(e) => {
                self.record(&manifest.id, module_count, &id, command.failed(), false);
                return Err(e);
            }
        };

        if exists && !kind.replaces_existing() {
            info!(manifest = %id, "data service already exists");
            return Err(DeployError::AlreadyExists(id));
        }

        // Committed to mutating the host from here on.
        self.record(&manifest.id, module_count, &id, command.failed(), true);

        if exists {
            info!(manifest = %id, "reclaiming previous deployment");
            if let Err(e) = self.teardown(&id, false).await {
                self.record(&manifest.id, module_count, &id, command.failed(), false);
                return Err(DeployError::RedeployTeardownFailed {
                    id,
                    source: Box::new(e),
                });
            }
        }

        // Pull only images missing from the host.
        for module in &manifest.modules {
            let image = match module.image_ref() {
                Ok(image) => image,
                Err(e) => {
                    self.record(&manifest.id, module_count, &id, command.failed(), false);
                    return Err(DeployError::Manifest(e.into()));
                }
            };

            let present = match self
                .runtime_call("image_exists", self.runtime.image_exists(&image), |e| {
                    DeployError::QueryFailed(e.to_string())
                })
                .await
            {
                Ok(present) => present,
                Err(e) => {
                    self.record(&manifest.id, module_count, &id, command.failed(), false);
                    return Err(e);
                }
            };

            if present {
                debug!(manifest = %id, %image, "image already exists on host");
                continue;
            }

            info!(manifest = %id, %image, "pulling image");
            let auth = module.registry_auth();
            if let Err(e) = self
                .runtime_call(
                    "pull_image",
                    self.runtime.pull_image(&image, auth.as_ref()),
                    |e| DeployError::ImagePullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                    },
                )
                .await
            {
                self.record(&manifest.id, module_count, &id, command.failed(), false);
                return Err(e);
            }
        }

        // One network per service, scoped by the identity labels.
        let network_name = self.network_name(&id);
        let spec = NetworkSpec {
            name: network_name.clone(),
            driver: Some(manifest.network_driver.clone()),
            labels: manifest.effective_labels(),
        };

        if let Err(e) = self
            .runtime_call("create_network", self.runtime.create_network(&spec), |e| {
                DeployError::NetworkCreateFailed {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            })
            .await
        {
            self.record(&manifest.id, module_count, &id, command.failed(), false);
            return Err(e);
        }

        manifest.assign_network(network_name.clone());
        info!(manifest = %id, network = %network_name, "created network");

        // A manifest with nothing to run is a failure, and the network just
        // created has to go again.
        if manifest.modules.is_empty() {
            self.rollback(&id).await;
            self.record(&manifest.id, module_count, &id, command.failed(), false);
            return Err(DeployError::NoModules(id));
        }

        let configs = match manifest.container_configs() {
            Ok(configs) => configs,
            Err(e) => {
                self.rollback(&id).await;
                self.record(&manifest.id, module_count, &id, command.failed(), false);
                return Err(e.into());
            }
        };

        // Create and start containers in manifest order. Any failure rolls
        // the whole deployment back.
        for config in &configs {
            info!(manifest = %id, container = %config.name, image = %config.image, "creating container");

            let container_id = match self
                .runtime_call(
                    "create_container",
                    self.runtime.create_container(config),
                    |e| DeployError::ContainerStartFailed {
                        container: config.name.clone(),
                        reason: e.to_string(),
                    },
                )
                .await
            {
                Ok(container_id) => container_id,
                Err(e) => {
                    self.rollback(&id).await;
                    self.record(&manifest.id, module_count, &id, command.failed(), false);
                    return Err(e);
                }
            };

            if let Err(e) = self
                .runtime_call(
                    "start_container",
                    self.runtime.start_container(&container_id),
                    |e| DeployError::ContainerStartFailed {
                        container: config.name.clone(),
                        reason: e.to_string(),
                    },
                )
                .await
            {
                self.rollback(&id).await;
                self.record(&manifest.id, module_count, &id, command.failed(), false);
                return Err(e);
            }

            debug!(manifest = %id, container = %config.name, id = %container_id, "container started");
        }

        self.ledger
            .set_status(&manifest.id, configs.len(), &id, command.completed(), false)?;

        info!(manifest = %id, status = %command.completed(), "data service deployed");
        Ok(())
    }

    // =========================================================================
    // Stop / Start
    // =========================================================================

    /// Stop every running container of a service. Non-running containers are
    /// left untouched; the first stop failure aborts, leaving a mixed set.
    pub async fn stop_service(&self, id: &ManifestUniqueId) -> Result<(), DeployError> {
        info!(manifest = %id, "stopping data service");
        let command = Command::StopService;
        let (manifest_id, count) = self.ledger_context(id);

        let containers = match self
            .runtime_call(
                "list_containers",
                self.runtime
                    .list_containers(&ContainerFilters::by_labels(id.labels())),
                |e| DeployError::QueryFailed(e.to_string()),
            )
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                self.record(&manifest_id, count, id, command.failed(), false);
                return Err(e);
            }
        };

        self.record(&manifest_id, count, id, command.failed(), true);

        for container in &containers {
            if container.state != ContainerState::Running {
                debug!(
                    container = %container.display_name(),
                    state = ?container.state,
                    "container not running, skipping"
                );
                continue;
            }

            info!(container = %container.display_name(), "stopping container");
            if let Err(e) = self
                .runtime_call(
                    "stop_container",
                    self.runtime
                        .stop_container(&container.id, self.options.stop_timeout),
                    |e| DeployError::StopFailed {
                        container: container.display_name().to_string(),
                        reason: e.to_string(),
                    },
                )
                .await
            {
                self.record(&manifest_id, count, id, command.failed(), false);
                return Err(e);
            }
            debug!(container = %container.display_name(), "running --> exited");
        }

        self.ledger
            .set_status(&manifest_id, count, id, command.completed(), false)?;
        Ok(())
    }

    /// Start every stopped container of a service. Fails if the service has
    /// no containers at all.
    pub async fn start_service(&self, id: &ManifestUniqueId) -> Result<(), DeployError> {
        info!(manifest = %id, "starting data service");
        let command = Command::StartService;
        let (manifest_id, count) = self.ledger_context(id);

        let containers = match self
            .runtime_call(
                "list_containers",
                self.runtime
                    .list_containers(&ContainerFilters::by_labels(id.labels())),
                |e| DeployError::QueryFailed(e.to_string()),
            )
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                self.record(&manifest_id, count, id, command.failed(), false);
                return Err(e);
            }
        };

        if containers.is_empty() {
            self.record(&manifest_id, count, id, command.failed(), false);
            return Err(DeployError::NoContainers(id.clone()));
        }

        self.record(&manifest_id, count, id, command.failed(), true);

        for container in &containers {
            if !container.state.is_startable() {
                debug!(
                    container = %container.display_name(),
                    state = ?container.state,
                    "container not startable, skipping"
                );
                continue;
            }

            info!(container = %container.display_name(), "starting container");
            let result = self
                .runtime_call(
                    "start_container",
                    self.runtime.start_container(&container.id),
                    |e| DeployError::StartFailed {
                        container: container.display_name().to_string(),
                        reason: e.to_string(),
                    },
                )
                .await;

            match result {
                Ok(()) => debug!(container = %container.display_name(), "--> running"),
                // The engine may have restarted it between list and start.
                Err(DeployError::StartFailed { ref reason, .. })
                    if reason.contains("already running") =>
                {
                    debug!(container = %container.display_name(), "already running");
                }
                Err(e) => {
                    self.record(&manifest_id, count, id, command.failed(), false);
                    return Err(e);
                }
            }
        }

        self.ledger
            .set_status(&manifest_id, count, id, command.completed(), false)?;
        Ok(())
    }

    // =========================================================================
    // Undeploy / Remove
    // =========================================================================

    /// Tear down a service: containers and network go, images stay.
    pub async fn undeploy(&self, id: &ManifestUniqueId) -> Result<(), DeployError> {
        self.undeploy_with(id, Command::Undeploy).await
    }

    /// Tear down a service and delete its images, except those still
    /// referenced by containers elsewhere on the host.
    pub async fn remove(&self, id: &ManifestUniqueId) -> Result<(), DeployError> {
        self.undeploy_with(id, Command::Remove).await
    }

    async fn undeploy_with(
        &self,
        id: &ManifestUniqueId,
        command: Command,
    ) -> Result<(), DeployError> {
        info!(manifest = %id, %command, "undeploying data service");
        let (manifest_id, count) = self.ledger_context(id);

        let exists = match self.service_exists(id).await {
            Ok(exists) => exists,
            Err(e) => {
                self.record(&manifest_id, count, id, command.failed(), false);
                return Err(e);
            }
        };

        if !exists {
            warn!(manifest = %id, "data service does not exist");
            self.record(&manifest_id, count, id, command.failed(), false);
            return Err(DeployError::NotFound(id.clone()));
        }

        self.record(&manifest_id, count, id, command.failed(), true);

        match self.teardown(id, command == Command::Remove).await {
            Ok(()) => {
                self.ledger
                    .set_status(&manifest_id, count, id, command.completed(), false)?;
                info!(manifest = %id, status = %command.completed(), "data service undeployed");
                Ok(())
            }
            Err(e) => {
                self.record(&manifest_id, count, id, command.failed(), false);
                Err(e)
            }
        }
    }

    /// Best-effort teardown of everything belonging to an identity: stop and
    /// remove containers, optionally sweep now-unreferenced images, prune the
    /// service network. All steps run regardless of individual failures;
    /// failures are accumulated into one aggregate error.
    async fn teardown(
        &self,
        id: &ManifestUniqueId,
        remove_images: bool,
    ) -> Result<(), DeployError> {
        let containers = self
            .runtime_call(
                "list_containers",
                self.runtime
                    .list_containers(&ContainerFilters::by_labels(id.labels())),
                |e| DeployError::QueryFailed(e.to_string()),
            )
            .await?;

        let mut causes: Vec<String> = Vec::new();
        let mut images: HashSet<crate::types::ImageId> = HashSet::new();

        for container in &containers {
            images.insert(container.image_id.clone());

            debug!(container = %container.display_name(), "stopping and removing container");
            if let Err(e) = self
                .best_effort(
                    "stop_container",
                    self.runtime
                        .stop_container(&container.id, self.options.stop_timeout),
                )
                .await
            {
                // Force removal below handles a container that will not stop.
                debug!(container = %container.display_name(), error = %e, "stop failed, forcing removal");
            }

            if let Err(e) = self
                .best_effort(
                    "remove_container",
                    self.runtime.remove_container(&container.id, true),
                )
                .await
            {
                causes.push(format!(
                    "remove container {}: {}",
                    container.display_name(),
                    e
                ));
            }
        }

        // An image is deleted only when no container anywhere on the host
        // still references its ID; shared base images survive.
        if remove_images && !images.is_empty() {
            match self
                .best_effort(
                    "list_containers",
                    self.runtime.list_containers(&ContainerFilters::everything()),
                )
                .await
            {
                Ok(all_containers) => {
                    for image_id in &images {
                        if all_containers.iter().any(|c| &c.image_id == image_id) {
                            debug!(image = %image_id, "image still referenced, keeping");
                            continue;
                        }

                        info!(image = %image_id, "removing image");
                        if let Err(e) = self
                            .best_effort("remove_image", self.runtime.remove_image(image_id, false))
                            .await
                        {
                            causes.push(format!("remove image {}: {}", image_id, e));
                        }
                    }
                }
                Err(e) => causes.push(format!("list all containers: {}", e)),
            }
        }

        debug!(manifest = %id, "pruning networks");
        if let Err(e) = self
            .best_effort(
                "prune_networks",
                self.runtime
                    .prune_networks(&NetworkFilters::by_labels(id.labels())),
            )
            .await
        {
            causes.push(format!("prune networks: {}", e));
        }

        if causes.is_empty() {
            Ok(())
        } else {
            Err(DeployError::UndeployPartialFailure {
                id: id.clone(),
                causes,
            })
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// A service exists when a network carrying its identity labels does.
    async fn service_exists(&self, id: &ManifestUniqueId) -> Result<bool, DeployError> {
        let networks = self
            .runtime_call(
                "list_networks",
                self.runtime
                    .list_networks(&NetworkFilters::by_labels(id.labels())),
                |e| DeployError::QueryFailed(e.to_string()),
            )
            .await?;
        Ok(!networks.is_empty())
    }

    /// Rollback after a failed deploy: run the image-preserving teardown and
    /// keep going even if it is incomplete.
    async fn rollback(&self, id: &ManifestUniqueId) {
        info!(manifest = %id, "initiating rollback");
        if let Err(e) = self.teardown(id, false).await {
            warn!(manifest = %id, error = %e, "rollback did not complete cleanly");
        }
    }

    /// Deterministic network name for an identity. The identity labels, not
    /// the name, are the lookup key.
    fn network_name(&self, id: &ManifestUniqueId) -> String {
        sanitize_name(&format!(
            "gantry-{}-{}",
            id.manifest_name, id.version_number
        ))
    }

    /// Manifest ID and container count from the ledger, for commands that
    /// carry only an identity.
    fn ledger_context(&self, id: &ManifestUniqueId) -> (String, usize) {
        self.ledger
            .get(id)
            .map(|entry| (entry.manifest_id, entry.container_count))
            .unwrap_or_default()
    }

    /// Record a status, logging rather than failing when the ledger write
    /// itself fails: on failure paths the underlying error matters more.
    fn record(
        &self,
        manifest_id: &str,
        container_count: usize,
        id: &ManifestUniqueId,
        status: ServiceStatus,
        in_transition: bool,
    ) {
        if let Err(e) =
            self.ledger
                .set_status(manifest_id, container_count, id, status, in_transition)
        {
            tracing::error!(manifest = %id, error = %e, "failed to persist status ledger");
        }
    }

    /// Run one runtime call under the configured per-call timeout.
    async fn runtime_call<T, E, F>(
        &self,
        op: &'static str,
        fut: F,
        map_err: impl FnOnce(E) -> DeployError,
    ) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, E>>,
    {
        let result = match self.options.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                DeployError::RuntimeTimeout {
                    op,
                    seconds: limit.as_secs(),
                }
            })?,
            None => fut.await,
        };
        result.map_err(map_err)
    }

    /// Like `runtime_call`, but for teardown steps that accumulate failures
    /// instead of aborting: both errors and timeouts become plain strings.
    async fn best_effort<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, String>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match self.options.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("{} timed out after {}s", op, limit.as_secs())),
            },
            None => fut.await.map_err(|e| e.to_string()),
        }
    }
}
