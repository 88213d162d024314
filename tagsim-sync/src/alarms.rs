//! Blocking alarm subscriber

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tagsim_core::{AlarmEvent, TagError, TagResult};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

/// Receives alarm events from plain (non-async) threads
///
/// Every subscriber sees every event published after it was created. If it
/// falls more than the channel capacity behind, the oldest events are
/// skipped and a warning is logged.
///
/// # Example
///
/// ```rust,no_run
/// # use tagsim_sync::Simulator;
/// # fn example(simulator: &Simulator) -> Result<(), tagsim_core::TagError> {
/// let alarms = simulator.subscribe_alarms()?;
/// let event = alarms.get()?; // blocks until a threshold is crossed
/// println!("{}", event);
/// # Ok(())
/// # }
/// ```
pub struct AlarmSubscriber {
    rx: Mutex<broadcast::Receiver<AlarmEvent>>,
}

impl AlarmSubscriber {
    pub fn new(rx: broadcast::Receiver<AlarmEvent>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Blocks until an event arrives
    ///
    /// # Errors
    ///
    /// - `TagError::RuntimeShutdown` once the simulator context is gone
    pub fn get(&self) -> TagResult<AlarmEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match rx.blocking_recv() {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "alarm subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(TagError::RuntimeShutdown),
            }
        }
    }

    /// Waits up to `timeout` for an event
    ///
    /// # Errors
    ///
    /// - `TagError::NoEvent` if nothing arrived in time
    /// - `TagError::RuntimeShutdown` once the simulator context is gone
    pub fn get_with_timeout(&self, timeout: Duration) -> TagResult<AlarmEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_get() {
                Err(TagError::NoEvent) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(2));
                }
                other => return other,
            }
        }
    }

    /// Returns an event if one is already queued
    ///
    /// # Errors
    ///
    /// - `TagError::NoEvent` if the queue is empty
    /// - `TagError::RuntimeShutdown` once the simulator context is gone
    pub fn try_get(&self) -> TagResult<AlarmEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match rx.try_recv() {
                Ok(event) => return Ok(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "alarm subscriber lagged");
                }
                Err(TryRecvError::Empty) => return Err(TagError::NoEvent),
                Err(TryRecvError::Closed) => return Err(TagError::RuntimeShutdown),
            }
        }
    }

    /// Takes every queued event without blocking
    pub fn drain(&self) -> Vec<AlarmEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.try_get() {
            events.push(event);
        }
        events
    }
}

impl core::fmt::Debug for AlarmSubscriber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlarmSubscriber").finish_non_exhaustive()
    }
}
