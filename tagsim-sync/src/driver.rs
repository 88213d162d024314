//! Periodic driver threads
//!
//! Each driver is a dedicated, named OS thread hosting a current-thread Tokio
//! runtime. The runtime is only used for its timer and for waiting on the
//! stop channel; the task body itself is synchronous.
//!
//! A driver stops when any of these happens:
//! - the shared [`RunState`] is switched off (checked before every tick)
//! - its own stop signal arrives (wakes it immediately, even mid-sleep)
//! - the [`PeriodicDriver`] is dropped
//!
//! A task that panics ends its driver and switches the shared [`RunState`]
//! off, so the sibling drivers wind down too. The panic is reported by
//! [`PeriodicDriver::stop`] as `StopFailed`.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tagsim_core::{TagError, TagResult};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Process-wide running flag shared by every driver of one simulator
///
/// Switching it off is one-way and idempotent. Stores use `Release` and loads
/// use `Acquire`, so everything written before `stop()` is visible to a
/// driver that observes the flag as off.
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Switches the flag off; returns `true` only for the call that did it
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Work performed once per period on a driver thread
pub trait PeriodicTask: Send + 'static {
    /// Short name used for the thread name and in logs
    fn name(&self) -> &'static str;

    fn tick(&mut self);
}

/// How a driver thread finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverExit {
    pub name: &'static str,
    pub ticks: u64,
}

#[derive(Debug, Clone, Copy)]
struct StopSignal;

/// Owner of one running driver thread
pub struct PeriodicDriver {
    name: &'static str,
    thread_handle: Option<JoinHandle<Result<u64, String>>>,
    stop_tx: Option<mpsc::Sender<StopSignal>>,
}

impl PeriodicDriver {
    /// Spawns the driver thread and waits until its runtime is up
    ///
    /// The first tick runs immediately, then once every `period`. Ticks that
    /// overrun are not made up for: the next one is scheduled a full period
    /// after the late one.
    ///
    /// # Errors
    ///
    /// - `TagError::StartFailed` if the thread or its runtime cannot be created
    pub fn spawn<T: PeriodicTask>(
        mut task: T,
        period: Duration,
        state: Arc<RunState>,
    ) -> TagResult<Self> {
        let name = task.name();
        if period.is_zero() {
            return Err(TagError::StartFailed {
                message: format!("{}: period must be non-zero", name),
            });
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<StopSignal>(1);
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

        let thread_handle = thread::Builder::new()
            .name(format!("tagsim-{}", name))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return Ok(0);
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let outcome = runtime.block_on(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    let mut ticks = 0u64;

                    while state.is_running() {
                        tokio::select! {
                            biased;
                            _ = stop_rx.recv() => break,
                            _ = interval.tick() => {
                                if !state.is_running() {
                                    break;
                                }
                                let result = catch_unwind(AssertUnwindSafe(|| task.tick()));
                                if let Err(payload) = result {
                                    let reason = panic_message(payload.as_ref());
                                    state.stop();
                                    error!(
                                        driver = name,
                                        ticks,
                                        panic = %reason,
                                        "periodic task panicked, stopping all drivers"
                                    );
                                    return Err(reason);
                                }
                                ticks += 1;
                            }
                        }
                    }
                    Ok(ticks)
                });

                debug!(driver = name, ?outcome, "driver loop exited");
                outcome
            })
            .map_err(|e| TagError::StartFailed {
                message: format!("{}: failed to spawn thread: {}", name, e),
            })?;

        let startup = ready_rx.recv();
        if !matches!(startup, Ok(Ok(()))) {
            let _ = thread_handle.join();
            let reason = match startup {
                Ok(Err(reason)) => reason,
                _ => "thread exited during startup".to_string(),
            };
            return Err(TagError::StartFailed {
                message: format!("{}: {}", name, reason),
            });
        }

        info!(
            driver = name,
            period_ms = period.as_millis() as u64,
            "periodic driver started"
        );

        Ok(Self {
            name,
            thread_handle: Some(thread_handle),
            stop_tx: Some(stop_tx),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true while the driver thread has not exited
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the driver and waits for its thread to exit
    pub fn stop(mut self) -> TagResult<DriverExit> {
        self.stop_internal(None)
    }

    /// Like [`stop`](Self::stop), but gives up after `timeout`
    ///
    /// # Errors
    ///
    /// - `TagError::StopFailed` if the thread does not exit in time or panicked.
    ///   A thread that timed out is left detached.
    pub fn stop_timeout(mut self, timeout: Duration) -> TagResult<DriverExit> {
        self.stop_internal(Some(timeout))
    }

    fn stop_internal(&mut self, timeout: Option<Duration>) -> TagResult<DriverExit> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // A full channel or a gone receiver both mean the thread is already stopping
            let _ = stop_tx.try_send(StopSignal);
        }

        let Some(thread_handle) = self.thread_handle.take() else {
            return Err(TagError::StopFailed {
                message: format!("{}: driver already stopped", self.name),
            });
        };

        if let Some(limit) = timeout {
            let start = Instant::now();
            while !thread_handle.is_finished() {
                if start.elapsed() > limit {
                    return Err(TagError::StopFailed {
                        message: format!("{}: thread did not exit within {:?}", self.name, limit),
                    });
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        let ticks = thread_handle
            .join()
            .map_err(|_| TagError::StopFailed {
                message: format!("{}: thread panicked", self.name),
            })?
            .map_err(|reason| TagError::StopFailed {
                message: format!("{}: task panicked: {}", self.name, reason),
            })?;

        info!(driver = self.name, ticks, "periodic driver stopped");
        Ok(DriverExit {
            name: self.name,
            ticks,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Drop for PeriodicDriver {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!(
                driver = self.name,
                "PeriodicDriver dropped without stop(); stopping now"
            );

            if let Err(e) = self.stop_internal(Some(Duration::from_secs(1))) {
                warn!(driver = self.name, error = %e, "emergency stop failed");
            }
        }
    }
}

impl core::fmt::Debug for PeriodicDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PeriodicDriver")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
