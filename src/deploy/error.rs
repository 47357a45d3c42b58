// ABOUTME: Error types for lifecycle operations.
// ABOUTME: Covers image pull, network, container, teardown, and ledger failures.

use crate::ledger::LedgerError;
use crate::manifest::{ManifestError, ManifestUniqueId};

/// Errors surfaced by lifecycle operations. Every variant corresponds to a
/// `_FAILED` ledger status written before the error is returned, with one
/// exception: `AlreadyExists` performs no mutation at all.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Plain deploy against an identity that is already deployed.
    #[error("data service {0} already exists")]
    AlreadyExists(ManifestUniqueId),

    /// An image could not be pulled; the whole deployment is aborted.
    #[error("failed to pull image {image}: {reason}")]
    ImagePullFailed { image: String, reason: String },

    /// The service network could not be created.
    #[error("failed to create network for {id}: {reason}")]
    NetworkCreateFailed {
        id: ManifestUniqueId,
        reason: String,
    },

    /// The manifest reached deployment with an empty module list.
    #[error("manifest {0} contains no modules")]
    NoModules(ManifestUniqueId),

    /// A container could not be created or started; rollback was executed.
    #[error("failed to start container {container}: {reason}")]
    ContainerStartFailed { container: String, reason: String },

    /// Start was requested but no containers exist for the identity.
    #[error("no containers found for data service {0}")]
    NoContainers(ManifestUniqueId),

    /// A container could not be stopped.
    #[error("failed to stop container {container}: {reason}")]
    StopFailed { container: String, reason: String },

    /// A container could not be started.
    #[error("failed to start container {container}: {reason}")]
    StartFailed { container: String, reason: String },

    /// Teardown ran to completion but some steps failed; every cause is
    /// listed.
    #[error("data service {id} could not be torn down completely: {}", causes.join("; "))]
    UndeployPartialFailure {
        id: ManifestUniqueId,
        causes: Vec<String>,
    },

    /// A redeploy could not reclaim the previous deployment.
    #[error("redeploy of {id} failed during teardown: {source}")]
    RedeployTeardownFailed {
        id: ManifestUniqueId,
        #[source]
        source: Box<DeployError>,
    },

    /// Operation against an identity with no runtime trace.
    #[error("data service {0} does not exist")]
    NotFound(ManifestUniqueId),

    /// A runtime call exceeded the configured per-call timeout.
    #[error("runtime call {op} timed out after {seconds}s")]
    RuntimeTimeout { op: &'static str, seconds: u64 },

    /// A runtime list/inspect query failed.
    #[error("runtime query failed: {0}")]
    QueryFailed(String),

    /// The manifest could not produce container configurations.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The status ledger could not be persisted.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
