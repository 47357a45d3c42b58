// ABOUTME: Container runtime adapter: capability traits plus the bollard impl.
// ABOUTME: The orchestrator consumes the traits; main.rs constructs BollardRuntime.

mod bollard;
mod traits;

pub use bollard::{BollardRuntime, ConnectionError};
pub use traits::*;
