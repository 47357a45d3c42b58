// ABOUTME: Deployment orchestration for data service lifecycles.
// ABOUTME: Exports the orchestrator, command vocabulary, errors, and locks.

mod command;
mod error;
mod locks;
mod orchestrator;

pub use command::{Command, DeployKind};
pub use error::DeployError;
pub use locks::IdentityLocks;
pub use orchestrator::{Orchestrator, OrchestratorOptions};
