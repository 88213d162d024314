//! Process-wide operational statistics
//!
//! Counters are touched by every gateway call on every tag, so they live
//! outside all tag locks and use plain atomic increments.

use chrono::{DateTime, Utc};
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use serde::Serialize;

/// Request/error counters, connected-client gauge and start time
///
/// # Example
///
/// ```rust
/// use tagsim_core::Statistics;
/// use chrono::Utc;
///
/// let stats = Statistics::new(Utc::now());
/// stats.record_request();
/// stats.record_error();
///
/// let snapshot = stats.snapshot(Utc::now());
/// assert_eq!(snapshot.total_requests, 1);
/// assert_eq!(snapshot.total_errors, 1);
/// ```
#[derive(Debug)]
pub struct Statistics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    connected_clients: AtomicU32,
    started_at: DateTime<Utc>,
}

impl Statistics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            connected_clients: AtomicU32::new(0),
            started_at,
        }
    }

    #[inline]
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_connected(&self) {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the client gauge, saturating at zero
    pub fn client_disconnected(&self) {
        let _ = self
            .connected_clients
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn connected_clients(&self) -> u32 {
        self.connected_clients.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Reads every counter into a plain value
    ///
    /// Fields are loaded one after another, so under concurrent traffic the
    /// counters may be from slightly different instants.
    pub fn snapshot(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let uptime_secs = (now - self.started_at).num_seconds().max(0) as u64;
        StatsSnapshot {
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            connected_clients: self.connected_clients(),
            started_at: self.started_at,
            uptime_secs,
        }
    }
}

/// Point-in-time copy of [`Statistics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub connected_clients: u32,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_from_many_threads() {
        let stats = Arc::new(Statistics::new(Utc::now()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_request();
                    }
                    stats.record_error();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.total_requests(), 8000);
        assert_eq!(stats.total_errors(), 8);
    }

    #[test]
    fn test_client_gauge_saturates() {
        let stats = Statistics::new(Utc::now());
        stats.client_disconnected();
        assert_eq!(stats.connected_clients(), 0);

        stats.client_connected();
        stats.client_connected();
        stats.client_disconnected();
        assert_eq!(stats.connected_clients(), 1);
    }

    #[test]
    fn test_snapshot_uptime() {
        let start = Utc.timestamp_opt(1_000, 0).unwrap();
        let stats = Statistics::new(start);
        let snapshot = stats.snapshot(Utc.timestamp_opt(1_090, 0).unwrap());
        assert_eq!(snapshot.uptime_secs, 90);
        assert_eq!(snapshot.started_at, start);

        // Clock behind the start time reports zero rather than wrapping
        let snapshot = stats.snapshot(Utc.timestamp_opt(900, 0).unwrap());
        assert_eq!(snapshot.uptime_secs, 0);
    }
}
