//! KubeWatch - alert detection and health scoring for Kubernetes clusters
//!
//! Polls the snapshot document written by an external collector, evaluates
//! it with the alert engine and publishes each cycle report as JSON.

use anyhow::{Context, Result};
use kubewatch_core::Engine;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod poller;

const KUBEWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = KUBEWATCH_VERSION, "Starting kubewatch");

    let config = config::AgentConfig::load()?;
    info!(
        cluster = %config.cluster_name,
        rules_disabled = config.engine.disabled_rules.len(),
        "KubeWatch configured"
    );

    let engine = Engine::new(config.engine.clone())
        .context("Failed to build alert engine")?
        .with_cluster_name(&config.cluster_name);

    let poller = poller::Poller::new(
        engine,
        config.snapshot_path.clone(),
        config.output_path.clone(),
        Duration::from_secs(config.interval_secs),
    );

    if config.once {
        let report = poller.poll_once().await?;
        info!(alerts = report.alerts.len(), "Single cycle complete");
        return Ok(());
    }

    poller
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    info!("Shutting down");
    Ok(())
}
