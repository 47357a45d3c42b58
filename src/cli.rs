// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One subcommand per lifecycle command, plus the ledger report.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Edge agent for deploying multi-container data services")]
#[command(version)]
pub struct Cli {
    /// Container engine socket path (overrides gantry.yml)
    #[arg(long, global = true)]
    pub socket: Option<String>,

    /// Status ledger file (overrides gantry.yml)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity of a deployed data service.
#[derive(Args)]
pub struct Identity {
    /// Manifest name
    #[arg(long)]
    pub name: String,

    /// Version number
    #[arg(long)]
    pub version: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a data service from a manifest file
    Deploy {
        /// Path to the manifest JSON
        manifest: PathBuf,
    },

    /// Tear down an existing data service, then deploy the manifest
    Redeploy {
        /// Path to the manifest JSON
        manifest: PathBuf,
    },

    /// Redeploy from a locally authored manifest
    LocalDeploy {
        /// Path to the manifest JSON
        manifest: PathBuf,
    },

    /// Stop a data service's running containers
    Stop(Identity),

    /// Start a data service's stopped containers
    Start(Identity),

    /// Remove a data service's containers and network; images stay
    Undeploy(Identity),

    /// Remove a data service including images unreferenced elsewhere
    Remove(Identity),

    /// Show the status ledger
    Status,
}
