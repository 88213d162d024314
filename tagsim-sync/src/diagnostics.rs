//! Diagnostics reporter: periodic statistics snapshots

use crate::driver::{PeriodicDriver, PeriodicTask, RunState};
use std::sync::Arc;
use tagsim_core::{SimulatorContext, StatsSnapshot, TagResult};
use tokio::sync::watch;
use tracing::info;

/// Logs a [`StatsSnapshot`] every period and keeps the latest one observable
///
/// Only reads the atomic statistics; it never touches a tag.
pub struct DiagnosticsReporter {
    ctx: Arc<SimulatorContext>,
    latest: watch::Sender<Option<StatsSnapshot>>,
}

impl DiagnosticsReporter {
    pub fn new(ctx: Arc<SimulatorContext>) -> (Self, watch::Receiver<Option<StatsSnapshot>>) {
        let (latest, rx) = watch::channel(None);
        (Self { ctx, latest }, rx)
    }

    /// Spawns the reporter thread at the configured diagnostics interval
    pub fn start(
        ctx: Arc<SimulatorContext>,
        state: Arc<RunState>,
    ) -> TagResult<(PeriodicDriver, watch::Receiver<Option<StatsSnapshot>>)> {
        let period = ctx.config().diagnostics_interval();
        let (reporter, rx) = Self::new(ctx);
        let driver = PeriodicDriver::spawn(reporter, period, state)?;
        Ok((driver, rx))
    }

    /// Takes and logs one snapshot
    pub fn report(&self) -> StatsSnapshot {
        let snapshot = self.ctx.stats().snapshot(self.ctx.now());
        info!(
            uptime_secs = snapshot.uptime_secs,
            total_requests = snapshot.total_requests,
            total_errors = snapshot.total_errors,
            connected_clients = snapshot.connected_clients,
            tags = self.ctx.store().len(),
            "diagnostics"
        );
        self.latest.send_replace(Some(snapshot.clone()));
        snapshot
    }
}

impl PeriodicTask for DiagnosticsReporter {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn tick(&mut self) {
        self.report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tagsim_core::{ManualClock, SimulatorConfig, TagKey};

    #[test]
    fn test_report_reflects_gateway_traffic() {
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let ctx = Arc::new(
            SimulatorContext::with_clock(SimulatorConfig::default(), clock.clone()).unwrap(),
        );
        let gw = ctx.gateway();
        let _session = gw.connect();

        gw.read_key(&TagKey::new("basic", "FloatVariable")).unwrap();
        let _ = gw.read_key(&TagKey::new("basic", "Missing"));
        clock.advance(Duration::from_secs(45));

        let (reporter, rx) = DiagnosticsReporter::new(ctx.clone());
        assert!(rx.borrow().is_none());

        let snapshot = reporter.report();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.connected_clients, 1);
        assert_eq!(snapshot.uptime_secs, 45);
        assert_eq!(rx.borrow().as_ref(), Some(&snapshot));
    }
}
