//! Expiry Sweep Background Task
//!
//! Periodically deletes every record whose ttl has passed, across all
//! tenants. Reads already hide and reclaim expired records one at a time;
//! the sweep bounds how long unread expired records keep occupying storage.
//!
//! The sweep only touches the durable store. Cache entries carry their own
//! expiry and are never longer-lived than the record they mirror.
//!
//! # Configuration
//!
//! ```rust
//! use keystash_api::jobs::ExpirySweepConfig;
//! use std::time::Duration;
//!
//! let config = ExpirySweepConfig {
//!     interval: Duration::from_secs(1800), // Every 30 minutes
//!     enabled: true,
//! };
//! ```

use crate::constants::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::telemetry;
use keystash_core::{Clock, KeystashResult};
use keystash_storage::ObjectStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the expiry sweep background task.
#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    /// Time between sweeps (default: 30 minutes)
    pub interval: Duration,

    /// Whether the sweep runs at all (default: true)
    pub enabled: bool,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            enabled: true,
        }
    }
}

impl ExpirySweepConfig {
    /// Create ExpirySweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `KEYSTASH_SWEEP_INTERVAL_SECS`: Seconds between sweeps (default: 1800)
    /// - `KEYSTASH_SWEEP_ENABLED`: Set to `false` to disable (default: true)
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("KEYSTASH_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        let enabled = std::env::var("KEYSTASH_SWEEP_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self { interval, enabled }
    }

    /// Short interval for development.
    pub fn development() -> Self {
        Self {
            interval: Duration::from_secs(10),
            enabled: true,
        }
    }

    pub fn production() -> Self {
        Self::default()
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since startup.
#[derive(Debug, Default)]
pub struct ExpirySweepMetrics {
    /// Sweeps attempted
    pub sweeps: AtomicU64,

    /// Records deleted by all sweeps
    pub records_deleted: AtomicU64,

    /// Sweeps that failed
    pub sweep_errors: AtomicU64,
}

impl ExpirySweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ExpirySweepSnapshot {
        ExpirySweepSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirySweepSnapshot {
    pub sweeps: u64,
    pub records_deleted: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that deletes expired records until shutdown.
///
/// The first sweep runs immediately, then once per `config.interval`. A
/// failed sweep is logged and counted; the next tick tries again.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(expiry_sweep_task(store, clock, config, shutdown_rx));
///
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn expiry_sweep_task(
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    config: ExpirySweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ExpirySweepMetrics> {
    let metrics = Arc::new(ExpirySweepMetrics::new());

    if !config.enabled {
        tracing::info!("Expiry sweep disabled");
        return metrics;
    }

    let mut sweep_interval = interval(config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        backend = store.backend_type(),
        "Expiry sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Expiry sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                run_sweep(store.as_ref(), clock.as_ref(), &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        records_deleted = snapshot.records_deleted,
        sweep_errors = snapshot.sweep_errors,
        "Expiry sweep task completed"
    );

    metrics
}

/// Delete every record expired as of the clock's current time.
pub async fn sweep_once(store: &dyn ObjectStore, clock: &dyn Clock) -> KeystashResult<u64> {
    store.delete_expired(clock.unix_now()).await
}

async fn run_sweep(store: &dyn ObjectStore, clock: &dyn Clock, metrics: &ExpirySweepMetrics) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);

    match sweep_once(store, clock).await {
        Ok(0) => {
            tracing::trace!("Expiry sweep found nothing to delete");
        }
        Ok(count) => {
            metrics.records_deleted.fetch_add(count, Ordering::Relaxed);
            if let Some(m) = telemetry::metrics() {
                m.record_swept(count);
            }
            tracing::info!(count, "Expired records deleted");
        }
        Err(e) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Expiry sweep failed");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
