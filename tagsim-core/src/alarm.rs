//! Alarm state and transition events

use crate::tag_key::TagKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Threshold plus latched level, stored under the tag's lock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    pub threshold: f64,
    pub active: bool,
}

impl AlarmState {
    /// A new alarm starts inactive
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            active: false,
        }
    }
}

/// Alarm level change detected during a tick, before it is tied to a tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmTransition {
    pub active: bool,
    pub value: f32,
    pub threshold: f64,
}

/// Alarm level change published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub key: TagKey,
    pub active: bool,
    pub value: f32,
    pub threshold: f64,
    pub at: DateTime<Utc>,
}

impl AlarmEvent {
    pub fn new(key: TagKey, transition: AlarmTransition, at: DateTime<Utc>) -> Self {
        Self {
            key,
            active: transition.active,
            value: transition.value,
            threshold: transition.threshold,
            at,
        }
    }
}

impl core::fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = if self.active { "raised" } else { "cleared" };
        write!(
            f,
            "alarm {} on {}: value {} threshold {}",
            state, self.key, self.value, self.threshold
        )
    }
}
