//! Background sweeper.
//!
//! Periodically evicts expired entries from every registered store. The
//! sweeper only bounds memory: reads already filter expired entries, so a
//! missed or late tick never changes what callers observe.
//!
//! # Example
//!
//! ```no_run
//! use relay_core::environment::SystemClock;
//! use relay_core::store::ExpiringStore;
//! use relay_core::sweeper::Sweeper;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let store: Arc<ExpiringStore<String>> =
//!     Arc::new(ExpiringStore::new("tokens", Arc::new(SystemClock)));
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
//! let handle = Sweeper::new(Duration::from_secs(300))
//!     .register(store.clone())
//!     .spawn(shutdown_rx);
//!
//! // ... serve traffic ...
//!
//! let _ = shutdown_tx.send(());
//! let _ = handle.await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Something whose expired entries can be evicted in bulk.
pub trait Sweepable: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Remove expired entries and return how many were removed.
    fn sweep_expired(&self) -> usize;
}

/// Periodic eviction task over a fixed set of stores.
pub struct Sweeper {
    interval: Duration,
    targets: Vec<Arc<dyn Sweepable>>,
}

impl Sweeper {
    /// Create a sweeper that runs every `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            targets: Vec::new(),
        }
    }

    /// Add a store to sweep.
    #[must_use]
    pub fn register(mut self, target: Arc<dyn Sweepable>) -> Self {
        self.targets.push(target);
        self
    }

    /// Sweep interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep over every registered store.
    ///
    /// Returns the total number of entries removed.
    pub fn sweep_once(&self) -> usize {
        self.targets
            .iter()
            .map(|target| {
                let removed = target.sweep_expired();
                debug!(store = target.name(), removed, "Swept expired entries");
                removed
            })
            .sum()
    }

    /// How far past a full interval a tick due at `scheduled` ran, if at all.
    fn late_by(&self, scheduled: Instant, now: Instant) -> Option<Duration> {
        let lateness = now.saturating_duration_since(scheduled);
        (lateness > self.interval).then_some(lateness)
    }

    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// The task exits when `shutdown` receives a value or its sender is
    /// dropped.
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<()>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            stores = self.targets.len(),
            "Sweeper started"
        );

        loop {
            tokio::select! {
                scheduled = ticker.tick() => {
                    if let Some(lateness) = self.late_by(scheduled, Instant::now()) {
                        warn!(
                            lateness_ms = u64::try_from(lateness.as_millis()).unwrap_or(u64::MAX),
                            "Sweep tick ran late; expired entries were held longer than usual"
                        );
                    }
                    let removed = self.sweep_once();
                    if removed > 0 {
                        info!(removed, "Sweep pass complete");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Sweeper stopped");
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("interval", &self.interval)
            .field(
                "targets",
                &self.targets.iter().map(|t| t.name().to_owned()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
