//! Simulator lifecycle handle

use crate::alarms::AlarmSubscriber;
use crate::diagnostics::DiagnosticsReporter;
use crate::driver::{PeriodicDriver, RunState};
use crate::scheduler::UpdateScheduler;
use std::sync::Arc;
use std::time::Duration;
use tagsim_core::{AccessGateway, SimulatorContext, StatsSnapshot, TagError, TagResult};
use tokio::sync::watch;
use tracing::{info, warn};

/// One step of an orderly shutdown, in the order they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    StopSignaled,
    SchedulerExited,
    DiagnosticsExited,
    TagsDestroyed,
}

/// What [`Simulator::shutdown`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub steps: Vec<ShutdownStep>,
    pub scheduler_ticks: u64,
    /// `None` when diagnostics were disabled or failed to start
    pub diagnostics_ticks: Option<u64>,
    pub tags_destroyed: usize,
}

/// Running simulator: the update scheduler, the optional diagnostics
/// reporter, and the shared context they drive.
///
/// # Resource Management
///
/// Call [`shutdown`](Self::shutdown) to stop both drivers and destroy the
/// tags in order. If the handle is dropped instead, a warning is logged and
/// both drivers are stopped; the tags are released whenever the last
/// gateway goes away.
pub struct Simulator {
    ctx: Option<Arc<SimulatorContext>>,
    state: Arc<RunState>,
    scheduler: Option<PeriodicDriver>,
    diagnostics: Option<PeriodicDriver>,
    latest_diagnostics: Option<watch::Receiver<Option<StatsSnapshot>>>,
}

impl Simulator {
    /// Starts the drivers over an already populated context
    ///
    /// The diagnostics reporter is only started when enabled in the context's
    /// configuration. Failing to start it is logged and tolerated.
    ///
    /// # Errors
    ///
    /// - `TagError::StartFailed` if the update scheduler cannot be started
    pub fn start(ctx: SimulatorContext) -> TagResult<Self> {
        let ctx = Arc::new(ctx);
        let state = Arc::new(RunState::new());

        let scheduler = UpdateScheduler::start(Arc::clone(&ctx), Arc::clone(&state))
            .map_err(|e| e.with_context("update scheduler"))?;

        let (diagnostics, latest_diagnostics) = if ctx.config().diagnostics_enabled {
            match DiagnosticsReporter::start(Arc::clone(&ctx), Arc::clone(&state)) {
                Ok((driver, rx)) => (Some(driver), Some(rx)),
                Err(e) => {
                    warn!(error = %e, "diagnostics reporter failed to start, continuing without it");
                    (None, None)
                }
            }
        } else {
            info!("diagnostics disabled");
            (None, None)
        };

        info!(
            tags = ctx.store().len(),
            update_interval_ms = ctx.config().update_interval_ms,
            "simulator started"
        );

        Ok(Self {
            ctx: Some(ctx),
            state,
            scheduler: Some(scheduler),
            diagnostics,
            latest_diagnostics,
        })
    }

    /// The shared context, while the simulator is running
    pub fn context(&self) -> Option<&Arc<SimulatorContext>> {
        self.ctx.as_ref()
    }

    /// Creates a gateway for reads and writes
    ///
    /// # Errors
    ///
    /// - `TagError::RuntimeShutdown` if the simulator is shutting down
    pub fn gateway(&self) -> TagResult<AccessGateway> {
        self.ctx
            .as_ref()
            .map(SimulatorContext::gateway)
            .ok_or(TagError::RuntimeShutdown)
    }

    /// Subscribes to alarm transitions published from now on
    ///
    /// # Errors
    ///
    /// - `TagError::RuntimeShutdown` if the simulator is shutting down
    pub fn subscribe_alarms(&self) -> TagResult<AlarmSubscriber> {
        self.ctx
            .as_ref()
            .map(|ctx| AlarmSubscriber::new(ctx.subscribe_alarms()))
            .ok_or(TagError::RuntimeShutdown)
    }

    /// The most recent diagnostics snapshot, if any has been taken yet
    pub fn latest_diagnostics(&self) -> Option<StatsSnapshot> {
        self.latest_diagnostics
            .as_ref()
            .and_then(|rx| rx.borrow().clone())
    }

    /// False once shutdown has begun or a driver's task has panicked
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Stops both drivers, waits for them, then destroys every tag
    ///
    /// Each driver gets the configured shutdown timeout to exit. The order is
    /// always: signal stop, scheduler exits, diagnostics exits, tags destroyed.
    ///
    /// # Errors
    ///
    /// - `TagError::StopFailed` if a driver does not exit in time or its task
    ///   panicked. No tag is destroyed in that case.
    /// - `TagError::TeardownBlocked` if gateways are still alive. The tags are
    ///   released when the last of them is dropped.
    pub fn shutdown(mut self) -> TagResult<ShutdownReport> {
        let timeout = self
            .ctx
            .as_ref()
            .map(|ctx| ctx.config().shutdown_timeout())
            .unwrap_or(Duration::from_secs(5));
        self.shutdown_internal(timeout)
    }

    /// Like [`shutdown`](Self::shutdown) with an explicit per-driver timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> TagResult<ShutdownReport> {
        self.shutdown_internal(timeout)
    }

    fn shutdown_internal(&mut self, timeout: Duration) -> TagResult<ShutdownReport> {
        let mut steps = Vec::with_capacity(4);

        self.state.stop();
        steps.push(ShutdownStep::StopSignaled);
        info!("shutting down simulator");

        let mut scheduler_ticks = 0;
        if let Some(driver) = self.scheduler.take() {
            scheduler_ticks = driver.stop_timeout(timeout)?.ticks;
            steps.push(ShutdownStep::SchedulerExited);
        }

        let mut diagnostics_ticks = None;
        if let Some(driver) = self.diagnostics.take() {
            diagnostics_ticks = Some(driver.stop_timeout(timeout)?.ticks);
            steps.push(ShutdownStep::DiagnosticsExited);
        }

        let ctx = self.ctx.take().ok_or(TagError::RuntimeShutdown)?;
        let tags_destroyed = ctx.teardown()?;
        steps.push(ShutdownStep::TagsDestroyed);

        info!(tags_destroyed, scheduler_ticks, "simulator stopped");
        Ok(ShutdownReport {
            steps,
            scheduler_ticks,
            diagnostics_ticks,
            tags_destroyed,
        })
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if self.scheduler.is_some() || self.diagnostics.is_some() {
            warn!("Simulator dropped without shutdown(); stopping drivers");
            self.state.stop();
            // Each driver's own Drop joins its thread
            self.scheduler.take();
            self.diagnostics.take();
        }
    }
}

impl core::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulator")
            .field("running", &self.is_running())
            .field("scheduler", &self.scheduler)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}
