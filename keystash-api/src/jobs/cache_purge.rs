//! Cache Purge Background Task
//!
//! Reads drop an expired cache entry only when they land on it. Entries
//! written once and never read again would otherwise sit in the backend
//! until it fills; for LMDB that is a fixed-size map. This task reclaims
//! them on an interval, independently of the durable store sweep.

use crate::constants::DEFAULT_CACHE_PURGE_INTERVAL_SECS;
use crate::telemetry;
use keystash_storage::CacheBackend;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache purge task.
#[derive(Debug, Clone)]
pub struct CachePurgeConfig {
    /// Time between purges (default: 5 minutes)
    pub interval: Duration,

    /// Whether the purge runs at all (default: true)
    pub enabled: bool,
}

impl Default for CachePurgeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CACHE_PURGE_INTERVAL_SECS),
            enabled: true,
        }
    }
}

impl CachePurgeConfig {
    /// Create CachePurgeConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `KEYSTASH_CACHE_PURGE_INTERVAL_SECS`: Seconds between purges (default: 300)
    /// - `KEYSTASH_CACHE_PURGE_ENABLED`: Set to `false` to disable (default: true)
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("KEYSTASH_CACHE_PURGE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_CACHE_PURGE_INTERVAL_SECS),
        );

        let enabled = std::env::var("KEYSTASH_CACHE_PURGE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self { interval, enabled }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for purge activity since startup.
#[derive(Debug, Default)]
pub struct CachePurgeMetrics {
    pub purges: AtomicU64,
    pub entries_purged: AtomicU64,
    pub purge_errors: AtomicU64,
}

impl CachePurgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that reclaims expired cache entries until shutdown.
///
/// Shares the shutdown channel with the expiry sweep. A failed purge is
/// logged and counted; the cache keeps serving.
pub async fn cache_purge_task(
    cache: Arc<dyn CacheBackend>,
    config: CachePurgeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CachePurgeMetrics> {
    let metrics = Arc::new(CachePurgeMetrics::new());

    if !config.enabled {
        tracing::info!("Cache purge disabled");
        return metrics;
    }

    let mut purge_interval = interval(config.interval);
    purge_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        backend = cache.backend_type(),
        "Cache purge task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache purge task shutting down");
                    break;
                }
            }

            _ = purge_interval.tick() => {
                run_purge(cache.as_ref(), &metrics).await;
            }
        }
    }

    metrics
}

async fn run_purge(cache: &dyn CacheBackend, metrics: &CachePurgeMetrics) {
    metrics.purges.fetch_add(1, Ordering::Relaxed);

    match cache.purge_expired().await {
        Ok(0) => {
            tracing::trace!("Cache purge found nothing to remove");
        }
        Ok(count) => {
            metrics.entries_purged.fetch_add(count, Ordering::Relaxed);
            if let Some(m) = telemetry::metrics() {
                m.record_cache_purged(count);
            }
            tracing::debug!(count, backend = cache.backend_type(), "Expired cache entries purged");
        }
        Err(e) => {
            metrics.purge_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, backend = cache.backend_type(), "Cache purge failed");
        }
    }
}
