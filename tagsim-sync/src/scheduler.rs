//! Update scheduler: ticks every tag once per period

use crate::driver::{PeriodicDriver, PeriodicTask, RunState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tagsim_core::{AlarmEvent, SimulatorContext, TagResult};
use tracing::warn;

/// Advances every tag's simulation and publishes alarm transitions
///
/// Tags are visited in creation order, each under its own lock only for the
/// duration of its own step. Alarm logging and publishing happen after that
/// tag's lock has been released.
pub struct UpdateScheduler {
    ctx: Arc<SimulatorContext>,
    rng: StdRng,
}

impl UpdateScheduler {
    pub fn new(ctx: Arc<SimulatorContext>) -> Self {
        Self::with_rng(ctx, StdRng::from_entropy())
    }

    /// Uses a caller-provided generator, for reproducible random tags
    pub fn with_rng(ctx: Arc<SimulatorContext>, rng: StdRng) -> Self {
        Self { ctx, rng }
    }

    /// Spawns the scheduler thread at the configured update interval
    pub fn start(
        ctx: Arc<SimulatorContext>,
        state: Arc<RunState>,
    ) -> TagResult<PeriodicDriver> {
        let period = ctx.config().update_interval();
        PeriodicDriver::spawn(Self::new(ctx), period, state)
    }

    /// Runs one pass over all tags and returns the alarm events it produced
    pub fn run_tick(&mut self) -> Vec<AlarmEvent> {
        let now = self.ctx.now();
        let mut events = Vec::new();

        for (_, tag) in self.ctx.store().iter() {
            let Some(transition) = tag.tick(now, &mut self.rng) else {
                continue;
            };

            let event = AlarmEvent::new(tag.key().clone(), transition, now);
            warn!(
                tag = %event.key,
                active = event.active,
                value = event.value,
                threshold = event.threshold,
                "alarm state changed"
            );
            self.ctx.publish_alarm(event.clone());
            events.push(event);
        }

        events
    }
}

impl PeriodicTask for UpdateScheduler {
    fn name(&self) -> &'static str {
        "update-scheduler"
    }

    fn tick(&mut self) {
        self.run_tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tagsim_core::{ManualClock, Simulation, SimulatorConfig, TagKey, TagSpec, TagValue};

    fn context(config: SimulatorConfig) -> (Arc<SimulatorContext>, Arc<ManualClock>) {
        // Whole minute, so sine tags start at phase zero
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_040, 0).unwrap(),
        ));
        let ctx = SimulatorContext::with_clock(config, clock.clone()).unwrap();
        (Arc::new(ctx), clock)
    }

    #[test]
    fn test_tick_advances_all_tags() {
        let (ctx, clock) = context(SimulatorConfig::default());
        let mut scheduler = UpdateScheduler::with_rng(ctx.clone(), StdRng::seed_from_u64(3));
        let gw = ctx.gateway();

        for _ in 0..5 {
            scheduler.run_tick();
            clock.advance(Duration::from_secs(1));
        }

        assert_eq!(
            gw.read_key(&TagKey::new("simulation", "Counter")).unwrap(),
            TagValue::Int32(5)
        );
        assert_eq!(
            gw.read_key(&TagKey::new("basic", "UInt32Variable")).unwrap(),
            TagValue::UInt32(128)
        );
        // Fixed tags are untouched
        assert_eq!(
            gw.read_key(&TagKey::new("basic", "Int32Variable")).unwrap(),
            TagValue::Int32(42)
        );
    }

    #[test]
    fn test_alarm_published_once_per_crossing() {
        let config = SimulatorConfig::default().tag(
            TagSpec::new("plant", "Level", 0.0f32)
                .with_simulation(Simulation::SineWave {
                    frequency: 1.0,
                    amplitude: 10.0,
                    offset: 0.0,
                })
                .with_alarm(5.0),
        );
        let (ctx, clock) = context(config);
        let mut rx = ctx.subscribe_alarms();
        let mut scheduler = UpdateScheduler::with_rng(ctx.clone(), StdRng::seed_from_u64(3));

        // One full 60 s period sampled every second: above 5 from 6 s to 24 s
        let mut events = Vec::new();
        for _ in 0..60 {
            events.extend(scheduler.run_tick());
            clock.advance(Duration::from_secs(1));
        }

        let raised = events.iter().filter(|e| e.active).count();
        let cleared = events.iter().filter(|e| !e.active).count();
        assert_eq!(raised, 1);
        assert_eq!(cleared, 1);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, TagKey::new("plant", "Level"));
        assert_eq!(first, events[0]);
    }
}
