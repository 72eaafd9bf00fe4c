//! Check Scheduler
//!
//! Keeps every proxy checked at the required cadence: on each tick it
//! selects due proxies (unchecked first, then stalest), dispatches them to
//! a semaphore-bounded worker pool, and folds results back into the
//! registry. A proxy never has two checks in flight at once.

use crate::application::Registry;
use crate::domain::ports::Prober;
use crate::domain::value_objects::ProxyKey;
use crate::infrastructure::shutdown::ShutdownController;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between dispatch ticks
    pub tick: Duration,
    /// Maximum concurrent in-flight checks
    pub concurrency: usize,
    /// A checked proxy becomes due again after this long
    pub recheck_after: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            concurrency: 50,
            recheck_after: chrono::Duration::minutes(5),
        }
    }
}

/// Dispatch loop driving the prober against due proxies.
pub struct CheckScheduler {
    registry: Arc<Registry>,
    prober: Arc<dyn Prober>,
    shutdown: ShutdownController,
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
    /// Keys with a check currently in flight; updated atomically with
    /// selection so a proxy is never double-dispatched.
    in_flight: Arc<Mutex<HashSet<ProxyKey>>>,
}

impl CheckScheduler {
    pub fn new(
        registry: Arc<Registry>,
        prober: Arc<dyn Prober>,
        shutdown: ShutdownController,
        config: SchedulerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Self {
            registry,
            prober,
            shutdown,
            config,
            semaphore,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// One dispatch pass: select due proxies up to the free worker slots
    /// and spawn a bounded worker for each. Returns the dispatched count.
    ///
    /// Never blocks on in-flight checks; when the pool is saturated the
    /// remaining due proxies simply wait for the next tick.
    pub fn tick_once(&self, now: DateTime<Utc>) -> usize {
        let free = self.semaphore.available_permits();
        if free == 0 {
            return 0;
        }

        // Selection and in-flight marking under one lock acquisition.
        // Every inserted key is immediately owned by a marker, so keys
        // cannot outlive dispatch regardless of how this pass ends.
        let markers: Vec<InFlightMarker> = {
            let mut in_flight = self.in_flight.lock();
            let due = self
                .registry
                .select_due(free, now, self.config.recheck_after, &in_flight);
            due.into_iter()
                .map(|key| {
                    in_flight.insert(key.clone());
                    InFlightMarker {
                        key,
                        set: self.in_flight.clone(),
                    }
                })
                .collect()
        };

        let mut dispatched = 0;
        for marker in markers {
            // Permits can run out mid-pass when ticks race; undispatched
            // markers drop here and clear their keys.
            let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Deleted between selection and dispatch: expected sweeper race.
            let Some(record) = self.registry.get(&marker.key) else {
                continue;
            };

            let url = record.url();
            let registry = self.registry.clone();
            let prober = self.prober.clone();
            let active = self.shutdown.check_guard();

            tokio::spawn(async move {
                let _permit = permit;
                let _active = active;
                let check = prober.probe(&url).await;
                if !check.success {
                    tracing::debug!(
                        "check failed for {}: {}",
                        marker.key,
                        check.error.map(|e| e.to_string()).unwrap_or_default()
                    );
                }
                registry.record_check(&marker.key, check);
                // marker drops here, clearing the in-flight entry; it also
                // drops if the task is cancelled mid-probe.
            });
            dispatched += 1;
        }

        if dispatched > 0 {
            tracing::debug!("dispatched {} checks", dispatched);
        }
        dispatched
    }

    /// Run the tick loop until shutdown.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick_once(Utc::now());
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("check scheduler stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Clears the owning key from the in-flight set on drop, so cancelled
/// workers leave their proxy eligible for the next tick.
struct InFlightMarker {
    key: ProxyKey,
    set: Arc<Mutex<HashSet<ProxyKey>>>,
}

impl Drop for InFlightMarker {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}
