//! Explicitly constructed simulator context
//!
//! Bundles everything the drivers and the access gateway share: the tag
//! store, the statistics, the alarm channel, the clock and the configuration.
//! A process may build as many independent contexts as it likes; nothing here
//! is global.
//!
//! # Lifecycle
//!
//! 1. Build with [`SimulatorContext::new`] (or [`SimulatorContext::with_clock`]),
//!    which creates the configured tags through exclusive access.
//! 2. Wrap in an `Arc` and hand clones to the drivers and gateways.
//! 3. Once every clone has been dropped, [`SimulatorContext::teardown`]
//!    recovers exclusive access and destroys the tags.

use crate::alarm::AlarmEvent;
use crate::config::SimulatorConfig;
use crate::error::{TagError, TagResult};
use crate::gateway::AccessGateway;
use crate::stats::Statistics;
use crate::store::TagStore;
use crate::time::{TimestampProvider, WallClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub struct SimulatorContext {
    store: TagStore,
    stats: Statistics,
    alarms: broadcast::Sender<AlarmEvent>,
    clock: Arc<dyn TimestampProvider>,
    config: SimulatorConfig,
}

impl SimulatorContext {
    /// Builds a context on the system clock and creates the configured tags
    pub fn new(config: SimulatorConfig) -> TagResult<Self> {
        Self::with_clock(config, Arc::new(WallClock))
    }

    /// Builds a context on the given clock and creates the configured tags
    ///
    /// A tag that cannot be created is logged and skipped; the remaining
    /// tags are still created. Only an invalid configuration fails the call.
    pub fn with_clock(
        config: SimulatorConfig,
        clock: Arc<dyn TimestampProvider>,
    ) -> TagResult<Self> {
        config.validate()?;

        let now = clock.now();
        let mut store = TagStore::with_capacity(config.max_tags);
        let specs = config.tag_specs(now);
        let requested = specs.len();

        for spec in &specs {
            if let Err(e) = store.create(spec, now) {
                if e.is_capacity_error() {
                    warn!(
                        tag = %spec.key(),
                        max_tags = config.max_tags,
                        "tag store full, skipping tag"
                    );
                } else {
                    error!(tag = %spec.key(), error = %e, "failed to create tag");
                }
            }
        }

        info!(created = store.len(), requested, "tag store populated");
        Ok(Self::from_parts(store, config, clock))
    }

    /// Wraps an already populated store
    pub fn from_parts(
        store: TagStore,
        config: SimulatorConfig,
        clock: Arc<dyn TimestampProvider>,
    ) -> Self {
        let (alarms, _) = broadcast::channel(config.alarm_channel_capacity.max(1));
        Self {
            stats: Statistics::new(clock.now()),
            store,
            alarms,
            clock,
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &TagStore {
        &self.store
    }

    #[inline]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[inline]
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Creates a gateway over this context
    pub fn gateway(self: &Arc<Self>) -> AccessGateway {
        AccessGateway::new(Arc::clone(self))
    }

    /// Receives every alarm event published after this call
    pub fn subscribe_alarms(&self) -> broadcast::Receiver<AlarmEvent> {
        self.alarms.subscribe()
    }

    /// Hands an event to current subscribers, returning how many there were
    pub fn publish_alarm(&self, event: AlarmEvent) -> usize {
        // Having no subscribers is normal; the event is simply dropped
        self.alarms.send(event).unwrap_or(0)
    }

    /// Destroys every tag once this is the last reference to the context
    ///
    /// Returns the number of tags destroyed. If drivers or gateways still
    /// hold clones, nothing is destroyed and `TeardownBlocked` reports how
    /// many other holders remain.
    pub fn teardown(self: Arc<Self>) -> TagResult<usize> {
        match Arc::try_unwrap(self) {
            Ok(ctx) => {
                let mut store = ctx.store;
                Ok(store.destroy_all())
            }
            Err(shared) => Err(TagError::TeardownBlocked {
                holders: Arc::strong_count(&shared) - 1,
            }),
        }
    }
}

impl core::fmt::Debug for SimulatorContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatorContext")
            .field("tags", &self.store.len())
            .field("max_tags", &self.store.max_tags())
            .field("alarm_subscribers", &self.alarms.receiver_count())
            .finish_non_exhaustive()
    }
}
