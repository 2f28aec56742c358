//! Wall-clock abstraction
//!
//! Expiry decisions go through a [`Clock`] so that tests can move time
//! without sleeping.

use crate::{Timestamp, UnixSeconds};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Current time as unix seconds, the unit records carry their `ttl` in.
    fn unix_now(&self) -> UnixSeconds {
        self.now().timestamp()
    }

    /// Current time as unix milliseconds.
    fn unix_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn at_unix(secs: UnixSeconds) -> Self {
        Self {
            millis: AtomicI64::new(secs.saturating_mul(1000)),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn set_unix(&self, secs: UnixSeconds) {
        self.millis.store(secs.saturating_mul(1000), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn unix_now(&self) -> UnixSeconds {
        self.millis.load(Ordering::SeqCst).div_euclid(1000)
    }

    fn unix_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
