//! Time sources
//!
//! The simulation engine and the statistics snapshot take their notion of
//! "now" from a [`TimestampProvider`] held by the simulator context. The
//! process uses [`WallClock`]; tests use [`ManualClock`] to step time
//! deterministically.

use chrono::{DateTime, TimeZone, Utc};
use core::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of the current UTC instant
///
/// # Example
/// ```rust
/// use tagsim_core::time::{TimestampProvider, WallClock};
///
/// fn stamp<T: TimestampProvider>(clock: &T) -> String {
///     clock.now().to_rfc3339()
/// }
///
/// assert!(!stamp(&WallClock).is_empty());
/// ```
pub trait TimestampProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimestampProvider for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Stored as milliseconds since the Unix epoch so it can be shared between
/// threads without a lock.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::Release);
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::AcqRel);
    }
}

impl TimestampProvider for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
