//! Vigil Coordinator Daemon
//!
//! Keeps long-lived sessions signed in at an external service and answers
//! session commands from local front-ends over IPC. The binary runs against
//! the built-in simulated service; embedders wire in a real
//! [`ServiceConnector`](vigil_core::client::ServiceConnector) through the
//! library API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_core::config::{self, CoordinatorConfig};
use vigil_core::registry::AccountRegistry;
use vigil_coordinator::ipc::IpcServer;
use vigil_coordinator::sim::SimConnector;
use vigil_coordinator::Coordinator;

#[derive(Parser)]
#[command(name = "vigil-coordinator")]
#[command(about = "Vigil session coordinator daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IPC port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Vigil Coordinator starting...");

    // Load configuration
    let mut cfg = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                CoordinatorConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            CoordinatorConfig::default()
        }
    };

    // Override IPC port if specified
    if let Some(port) = args.port {
        cfg.ipc_port = port;
    }

    // Build the account registry from the config
    let registry = Arc::new(AccountRegistry::load(&cfg).context("Invalid account configuration")?);
    if registry.is_empty() {
        tracing::warn!("No accounts configured - session commands will have nothing to act on");
    } else {
        tracing::info!("Loaded {} accounts", registry.len());
    }

    if cfg.allowed_requesters.is_empty() {
        tracing::warn!("No access list configured - all requesters are admitted");
    } else {
        tracing::info!("Access list: {} requesters", cfg.allowed_requesters.len());
    }

    let connector = Arc::new(SimConnector::new());
    let coordinator = Arc::new(Coordinator::new(registry, connector, &cfg));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Run the IPC server until cancelled
    let server = IpcServer::new(
        cfg.ipc_address(),
        Arc::clone(&coordinator),
        cfg.allowed_requesters.clone(),
    )
    .with_shutdown_token(cancel.clone());

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = cancel.cancelled() => {}
    }

    // Release every live session handle before exiting
    for status in coordinator.statuses() {
        if status.view.phase != vigil_core::ipc::Phase::Idle {
            let account_id = vigil_core::types::AccountId::new(status.account_id);
            if let Err(e) = coordinator.stop(&account_id).await {
                tracing::warn!("Failed to stop account {}: {}", account_id, e);
            }
        }
    }

    tracing::info!("Coordinator shutdown complete");
    Ok(())
}
