// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps, ContainerOps, NetworkOps and their shared types.

mod container;
mod image;
mod network;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkFilters, NetworkOps, NetworkSummary};
pub use shared_types::*;

/// The full capability surface the orchestrator needs from a container
/// engine. Implemented by the bollard adapter and by test doubles; the
/// orchestrator never talks to an engine any other way.
pub trait ContainerRuntime: ImageOps + ContainerOps + NetworkOps {}

impl<R: ImageOps + ContainerOps + NetworkOps> ContainerRuntime for R {}
