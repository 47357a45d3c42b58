// ABOUTME: Lifecycle command vocabulary and its mapping onto ledger statuses.
// ABOUTME: Each command has a wire name plus completed/failed status forms.

use std::fmt;

use crate::ledger::ServiceStatus;

/// A lifecycle command as it arrives on the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Deploy,
    Redeploy,
    LocalDeploy,
    StopService,
    StartService,
    Undeploy,
    Remove,
}

impl Command {
    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Deploy => "deploy",
            Command::Redeploy => "redeploy",
            Command::LocalDeploy => "local_deploy",
            Command::StopService => "stopservice",
            Command::StartService => "startservice",
            Command::Undeploy => "undeploy",
            Command::Remove => "remove",
        }
    }

    /// Status recorded when the command ran to completion.
    pub fn completed(self) -> ServiceStatus {
        match self {
            Command::Deploy => ServiceStatus::Deployed,
            Command::Redeploy => ServiceStatus::Redeployed,
            Command::LocalDeploy => ServiceStatus::LocalDeployed,
            Command::StopService => ServiceStatus::Stopped,
            Command::StartService => ServiceStatus::Started,
            Command::Undeploy => ServiceStatus::Undeployed,
            Command::Remove => ServiceStatus::Removed,
        }
    }

    /// Status recorded when the command failed. Every failure path uses this
    /// form; there is no bare-command variant.
    pub fn failed(self) -> ServiceStatus {
        match self {
            Command::Deploy => ServiceStatus::DeployFailed,
            Command::Redeploy => ServiceStatus::RedeployFailed,
            Command::LocalDeploy => ServiceStatus::LocalDeployFailed,
            Command::StopService => ServiceStatus::StopContainerFailed,
            Command::StartService => ServiceStatus::StartFailed,
            Command::Undeploy => ServiceStatus::UndeployFailed,
            Command::Remove => ServiceStatus::RemoveFailed,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of commands that carry a full manifest and run the deployment
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    /// Fresh deployment; fails if the service already exists.
    Deploy,
    /// Tear down the existing service first, then deploy.
    Redeploy,
    /// Redeploy from a locally supplied manifest.
    LocalDeploy,
}

impl DeployKind {
    pub fn command(self) -> Command {
        match self {
            DeployKind::Deploy => Command::Deploy,
            DeployKind::Redeploy => Command::Redeploy,
            DeployKind::LocalDeploy => Command::LocalDeploy,
        }
    }

    /// Redeploy and local deploy reclaim existing state before deploying.
    pub fn replaces_existing(self) -> bool {
        matches!(self, DeployKind::Redeploy | DeployKind::LocalDeploy)
    }
}
