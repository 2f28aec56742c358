//! Background Jobs for KEYSTASH API
//!
//! - `expiry_sweep`: Deletes expired records on a fixed interval
//! - `cache_purge`: Reclaims expired cache entries on a fixed interval
//!
//! # Usage
//!
//! ```ignore
//! use keystash_api::jobs::{expiry_sweep_task, ExpirySweepConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(expiry_sweep_task(store, clock, ExpirySweepConfig::from_env(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod cache_purge;
pub mod expiry_sweep;

pub use cache_purge::{cache_purge_task, CachePurgeConfig, CachePurgeMetrics};

pub use expiry_sweep::{
    expiry_sweep_task, sweep_once, ExpirySweepConfig, ExpirySweepMetrics, ExpirySweepSnapshot,
};
