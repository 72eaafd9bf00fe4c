//! Cleanup Sweeper
//!
//! Periodically deletes proxies that have been checked but have not
//! succeeded for longer than the dead threshold.

use crate::application::Registry;
use crate::infrastructure::shutdown::ShutdownController;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweep passes
    pub interval: Duration,
    /// A proxy with no success for this long is deleted
    pub dead_after: chrono::Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            dead_after: chrono::Duration::hours(1),
        }
    }
}

/// Background loop removing dead proxies from the registry.
pub struct CleanupSweeper {
    registry: Arc<Registry>,
    shutdown: ShutdownController,
    config: SweeperConfig,
}

impl CleanupSweeper {
    pub fn new(registry: Arc<Registry>, shutdown: ShutdownController, config: SweeperConfig) -> Self {
        Self {
            registry,
            shutdown,
            config,
        }
    }

    /// One sweep pass. Returns the number of proxies deleted.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let removed = self.registry.sweep(now, self.config.dead_after);
        if removed > 0 {
            tracing::info!(
                "swept {} dead proxies, {} remaining",
                removed,
                self.registry.len()
            );
        }
        removed
    }

    /// Run the sweep loop until shutdown.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            // The registry starts empty; skip the immediate first tick.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.sweep_once(Utc::now());
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("cleanup sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}
