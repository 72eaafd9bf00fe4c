//! Source Refresher
//!
//! Periodically re-fetches each configured source through the fetcher
//! port and upserts the resolved entries into the registry. A source is
//! due when it has never been fetched or when its last successful fetch
//! is older than the refresh threshold.

use crate::application::Registry;
use crate::domain::entities::Source;
use crate::domain::ports::SourceFetcher;
use crate::infrastructure::shutdown::ShutdownController;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Refresher configuration.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Interval between due-source scans
    pub interval: Duration,
    /// A fetched source becomes due again after this long
    pub refresh_after: chrono::Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            refresh_after: chrono::Duration::hours(1),
        }
    }
}

/// Background loop keeping the registry fed from the configured sources.
pub struct SourceRefresher {
    registry: Arc<Registry>,
    fetcher: Arc<dyn SourceFetcher>,
    sources: Vec<Source>,
    shutdown: ShutdownController,
    config: RefresherConfig,
    /// Last successful fetch per source id. Failed fetches are retried on
    /// the next scan.
    last_refreshed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SourceRefresher {
    pub fn new(
        registry: Arc<Registry>,
        fetcher: Arc<dyn SourceFetcher>,
        sources: Vec<Source>,
        shutdown: ShutdownController,
        config: RefresherConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            sources,
            shutdown,
            config,
            last_refreshed: Mutex::new(HashMap::new()),
        }
    }

    fn is_due(&self, source_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_refreshed.lock().get(source_id) {
            None => true,
            Some(at) => now - *at >= self.config.refresh_after,
        }
    }

    /// Fetch every due source. Returns the number of sources refreshed.
    pub async fn refresh_due(&self, now: DateTime<Utc>) -> usize {
        let mut refreshed = 0;
        for source in &self.sources {
            if !self.is_due(&source.id, now) {
                continue;
            }

            match self.fetcher.fetch(source).await {
                Ok(entries) => {
                    let created = self.registry.upsert(entries, &source.id, now);
                    if created > 0 {
                        tracing::info!(
                            "source '{}' contributed {} new proxies ({} total)",
                            source.id,
                            created,
                            self.registry.len()
                        );
                    }
                    self.last_refreshed.lock().insert(source.id.clone(), now);
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!("failed to refresh source '{}': {}", source.id, e);
                }
            }
        }
        refreshed
    }

    /// Run the refresh loop until shutdown. The first scan runs
    /// immediately so the registry is populated at startup.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.refresh_due(Utc::now()).await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("source refresher stopping");
                        break;
                    }
                }
            }
        })
    }
}
