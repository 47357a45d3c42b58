// ABOUTME: Entry point for the gantry agent binary.
// ABOUTME: Parses arguments, connects the runtime, dispatches lifecycle commands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, Identity};
use gantry::config::AgentConfig;
use gantry::deploy::{DeployKind, IdentityLocks, Orchestrator};
use gantry::error::Result;
use gantry::ledger::StatusLedger;
use gantry::manifest::{Manifest, ManifestUniqueId};
use gantry::runtime::BollardRuntime;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().expect("Failed to get current directory");
    let mut config = AgentConfig::load(&cwd)?;

    if let Some(socket) = cli.socket {
        config.socket = Some(socket);
    }
    if let Some(ledger_path) = cli.ledger {
        config.ledger = ledger_path;
    }

    let ledger = Arc::new(StatusLedger::open(&config.ledger)?);

    // The status report reads only the ledger; no engine connection needed.
    if matches!(&cli.command, Commands::Status) {
        print_status(&ledger);
        return Ok(());
    }

    let runtime = match config.socket.as_deref() {
        Some(socket) => BollardRuntime::connect_unix(socket)?,
        None => BollardRuntime::connect_local()?,
    };

    let orchestrator = Orchestrator::new(runtime, ledger, config.orchestrator_options());
    let locks = IdentityLocks::new();

    match cli.command {
        Commands::Deploy { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let _guard = locks.acquire(&manifest.unique_id).await;
            orchestrator.deploy(manifest, DeployKind::Deploy).await?;
        }
        Commands::Redeploy { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let _guard = locks.acquire(&manifest.unique_id).await;
            orchestrator.deploy(manifest, DeployKind::Redeploy).await?;
        }
        Commands::LocalDeploy { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let _guard = locks.acquire(&manifest.unique_id).await;
            orchestrator
                .deploy(manifest, DeployKind::LocalDeploy)
                .await?;
        }
        Commands::Stop(identity) => {
            let id = unique_id(&identity);
            let _guard = locks.acquire(&id).await;
            orchestrator.stop_service(&id).await?;
        }
        Commands::Start(identity) => {
            let id = unique_id(&identity);
            let _guard = locks.acquire(&id).await;
            orchestrator.start_service(&id).await?;
        }
        Commands::Undeploy(identity) => {
            let id = unique_id(&identity);
            let _guard = locks.acquire(&id).await;
            orchestrator.undeploy(&id).await?;
        }
        Commands::Remove(identity) => {
            let id = unique_id(&identity);
            let _guard = locks.acquire(&id).await;
            orchestrator.remove(&id).await?;
        }
        Commands::Status => unreachable!("handled above"),
    }

    Ok(())
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let contents = std::fs::read_to_string(path)?;
    Ok(Manifest::from_json(&contents)?)
}

fn unique_id(identity: &Identity) -> ManifestUniqueId {
    ManifestUniqueId::new(identity.name.clone(), identity.version.clone())
}

fn print_status(ledger: &StatusLedger) {
    let entries = ledger.snapshot();
    if entries.is_empty() {
        println!("No known data services.");
        return;
    }

    println!(
        "{:<32} {:<24} {:>10}  {}",
        "SERVICE", "STATUS", "CONTAINERS", "UPDATED"
    );
    for entry in entries {
        let marker = if entry.in_transition {
            " (in transition)"
        } else {
            ""
        };
        println!(
            "{:<32} {:<24} {:>10}  {}{}",
            entry.manifest_unique_id.to_string(),
            entry.status.to_string(),
            entry.container_count,
            entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            marker
        );
    }
}
