//! proxy-pool - Proxy Aggregation and Verification Service
//!
//! This is the composition root that wires together all the components.

mod adapters;
mod application;
mod config;
mod domain;
mod infrastructure;

use crate::adapters::inbound::{ApiServer, ApiState};
use crate::adapters::outbound::HttpSourceFetcher;
use crate::application::Registry;
use crate::config::{load_config, load_sources};
use crate::infrastructure::{
    shutdown_signal, CheckScheduler, CheckerConfig, CleanupSweeper, HttpProber, RefresherConfig,
    SchedulerConfig, ShutdownController, SourceRefresher, SweeperConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let sources = load_sources(Path::new(&cfg.sources_path))?;
    let listen_addr: SocketAddr = cfg.listen_addr.parse()?;

    tracing::info!(
        "starting proxy-pool listen={} sources={} concurrency={}",
        cfg.listen_addr,
        sources.len(),
        cfg.check_concurrency
    );

    // ===== COMPOSITION ROOT =====

    let shutdown = ShutdownController::new();
    let registry = Arc::new(Registry::new());

    // Outbound adapters
    let fetcher = Arc::new(HttpSourceFetcher::new()?);

    // An empty endpoint list selects the prober's built-in defaults
    let prober = Arc::new(HttpProber::new(CheckerConfig {
        timeout: Duration::from_secs(cfg.check_timeout_secs),
        endpoints: cfg.ip_endpoints.clone(),
    }));

    // Background loops
    let refresher = Arc::new(SourceRefresher::new(
        registry.clone(),
        fetcher,
        sources,
        shutdown.clone(),
        RefresherConfig {
            interval: Duration::from_secs(cfg.refresh_interval_secs),
            refresh_after: chrono::Duration::seconds(cfg.refresh_after_secs as i64),
        },
    ));
    refresher.spawn();

    let scheduler = Arc::new(CheckScheduler::new(
        registry.clone(),
        prober,
        shutdown.clone(),
        SchedulerConfig {
            tick: Duration::from_secs(cfg.check_interval_secs),
            concurrency: cfg.check_concurrency,
            recheck_after: chrono::Duration::seconds(cfg.recheck_after_secs as i64),
        },
    ));
    scheduler.spawn();

    let sweeper = Arc::new(CleanupSweeper::new(
        registry.clone(),
        shutdown.clone(),
        SweeperConfig {
            interval: Duration::from_secs(cfg.sweep_interval_secs),
            dead_after: chrono::Duration::seconds(cfg.dead_after_secs as i64),
        },
    ));
    sweeper.spawn();

    // Signal handling
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Inbound adapter; returns once shutdown is initiated
    let api = ApiServer::new(
        ApiState {
            registry,
            live_window: chrono::Duration::seconds(cfg.live_window_secs as i64),
        },
        listen_addr,
        shutdown.clone(),
    );
    api.run().await?;

    // Let probes already on the wire finish
    shutdown
        .wait_for_drain(Duration::from_secs(cfg.check_timeout_secs + 1))
        .await;
    tracing::info!("proxy-pool stopped");

    Ok(())
}
