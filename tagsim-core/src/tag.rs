//! A single typed, synchronized value cell
//!
//! Each [`Tag`] owns its own mutex over the mutable part of its state (the
//! value, the last update instant and the alarm level). Identity, payload
//! kind and simulation parameters are fixed at creation and readable without
//! locking.
//!
//! Values never leave the lock by reference: reads hand out a fresh copy and
//! writes copy the caller's payload in. Copies of text are made outside the
//! critical section where possible, and the previous buffer is dropped after
//! the lock is released.

use crate::alarm::{AlarmState, AlarmTransition};
use crate::error::{TagError, TagResult};
use crate::simulation::{advance, Simulation};
use crate::tag_key::TagKey;
use crate::value::{TagType, TagValue};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::TryReserveError;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fields guarded by the tag's lock
#[derive(Debug)]
struct TagState {
    value: TagValue,
    last_update: DateTime<Utc>,
    alarm: Option<AlarmState>,
}

#[derive(Debug)]
pub struct Tag {
    key: TagKey,
    tag_type: TagType,
    simulation: Simulation,
    state: Mutex<TagState>,
}

impl Tag {
    /// Creates a tag holding a copy of `initial`
    ///
    /// The payload kind of `initial` becomes the tag's permanent kind.
    pub fn new(
        key: TagKey,
        initial: &TagValue,
        simulation: Simulation,
        alarm_threshold: Option<f64>,
        now: DateTime<Utc>,
    ) -> TagResult<Self> {
        let value = initial
            .try_clone()
            .map_err(|e| copy_failed(&key, initial, e))?;

        Ok(Self {
            tag_type: initial.tag_type(),
            key,
            simulation,
            state: Mutex::new(TagState {
                value,
                last_update: now,
                alarm: alarm_threshold.map(AlarmState::new),
            }),
        })
    }

    #[inline]
    pub fn key(&self) -> &TagKey {
        &self.key
    }

    #[inline]
    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    #[inline]
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    // A panic while holding the lock cannot leave a half-written value: every
    // mutation is a single assignment of a fully built `TagValue`.
    fn lock_state(&self) -> MutexGuard<'_, TagState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns an independent copy of the current value
    pub fn read(&self) -> TagResult<TagValue> {
        let state = self.lock_state();
        state
            .value
            .try_clone()
            .map_err(|e| copy_failed(&self.key, &state.value, e))
    }

    /// Replaces the current value with a copy of `value`
    ///
    /// Fails with `TypeMismatch` before touching the lock if the payload kind
    /// differs, and with `CopyFailed` if the text copy cannot be allocated.
    /// Either way the stored value is left as it was.
    pub fn write(&self, value: &TagValue, now: DateTime<Utc>) -> TagResult<()> {
        if value.tag_type() != self.tag_type {
            return Err(TagError::TypeMismatch {
                tag: self.key.to_string(),
                expected: self.tag_type,
                actual: value.tag_type(),
            });
        }

        let incoming = value
            .try_clone()
            .map_err(|e| copy_failed(&self.key, value, e))?;

        let previous = {
            let mut state = self.lock_state();
            state.last_update = now;
            core::mem::replace(&mut state.value, incoming)
        };
        drop(previous);

        Ok(())
    }

    /// Runs one simulation step under the lock
    ///
    /// Returns the alarm transition, if any, after the lock has been released
    /// so the caller can log or publish it.
    pub fn tick<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<AlarmTransition> {
        let mut state = self.lock_state();
        let step = advance(
            &self.simulation,
            &state.value,
            state.alarm.as_ref(),
            now,
            rng,
        );

        let transition = step.alarm_transition(state.alarm.as_ref());

        if let Some(value) = step.value {
            state.value = value;
            state.last_update = now;
        }

        let alarm = state.alarm.as_mut()?;
        if let Some(active) = step.alarm_active {
            alarm.active = active;
        }
        let threshold = alarm.threshold;
        let value = state.value.as_f32();
        drop(state);

        Some(AlarmTransition {
            active: transition?,
            value: value?,
            threshold,
        })
    }

    /// Copies out the descriptive state of the tag
    pub fn info(&self) -> TagResult<TagInfo> {
        let (value, last_update, alarm) = {
            let state = self.lock_state();
            let value = state
                .value
                .try_clone()
                .map_err(|e| copy_failed(&self.key, &state.value, e))?;
            (value, state.last_update, state.alarm)
        };

        Ok(TagInfo {
            key: self.key.clone(),
            tag_type: self.tag_type,
            simulation: self.simulation,
            value,
            last_update,
            alarm,
        })
    }
}

fn copy_failed(key: &TagKey, value: &TagValue, error: TryReserveError) -> TagError {
    TagError::CopyFailed {
        tag: key.to_string(),
        length: value.payload_len(),
        reason: error.to_string(),
    }
}

/// Snapshot of a tag for describing it to a protocol layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagInfo {
    pub key: TagKey,
    pub tag_type: TagType,
    pub simulation: Simulation,
    pub value: TagValue,
    pub last_update: DateTime<Utc>,
    pub alarm: Option<AlarmState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn float_tag(initial: f32, threshold: Option<f64>) -> Tag {
        Tag::new(
            TagKey::new("simulation", "Level"),
            &TagValue::Float(initial),
            Simulation::None,
            threshold,
            at(0),
        )
        .unwrap()
    }

    #[test]
    fn test_read_returns_copy() {
        let tag = Tag::new(
            TagKey::new("basic", "StringVariable"),
            &TagValue::from("Hello OPC UA World!"),
            Simulation::None,
            None,
            at(0),
        )
        .unwrap();

        let mut copy = tag.read().unwrap();
        if let TagValue::String(s) = &mut copy {
            s.push_str(" mutated");
        }
        assert_eq!(tag.read().unwrap(), TagValue::from("Hello OPC UA World!"));
    }

    #[test]
    fn test_write_type_mismatch_leaves_value() {
        let tag = Tag::new(
            TagKey::new("basic", "Int32Variable"),
            &TagValue::Int32(42),
            Simulation::None,
            None,
            at(0),
        )
        .unwrap();

        let err = tag.write(&TagValue::from("nope"), at(5)).unwrap_err();
        assert!(matches!(
            err,
            TagError::TypeMismatch {
                expected: TagType::Int32,
                actual: TagType::String,
                ..
            }
        ));
        assert_eq!(tag.read().unwrap(), TagValue::Int32(42));
        assert_eq!(tag.info().unwrap().last_update, at(0));
    }

    #[test]
    fn test_write_updates_value_and_timestamp() {
        let tag = float_tag(1.0, None);
        tag.write(&TagValue::Float(2.5), at(10)).unwrap();

        let info = tag.info().unwrap();
        assert_eq!(info.value, TagValue::Float(2.5));
        assert_eq!(info.last_update, at(10));
        assert_eq!(info.tag_type, TagType::Float);
    }

    #[test]
    fn test_tick_counter() {
        let tag = Tag::new(
            TagKey::new("simulation", "Counter"),
            &TagValue::Int32(0),
            Simulation::Counter { step: 1.0 },
            None,
            at(0),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        for i in 1..=5 {
            assert_eq!(tag.tick(at(i), &mut rng), None);
        }
        assert_eq!(tag.read().unwrap(), TagValue::Int32(5));
        assert_eq!(tag.info().unwrap().last_update, at(5));
    }

    #[test]
    fn test_tick_reports_alarm_edges() {
        // One period per minute, peaking at 100 on the quarter minute
        let tag = Tag::new(
            TagKey::new("simulation", "SineWave"),
            &TagValue::Float(0.0),
            Simulation::SineWave {
                frequency: 1.0,
                amplitude: 100.0,
                offset: 0.0,
            },
            Some(50.0),
            at(0),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(tag.tick(at(0), &mut rng), None);

        let raised = tag.tick(at(15), &mut rng).unwrap();
        assert!(raised.active);
        assert_eq!(raised.value, 100.0);
        assert_eq!(raised.threshold, 50.0);

        // Still above: level-held, no new event
        assert_eq!(tag.tick(at(16), &mut rng), None);

        let cleared = tag.tick(at(30), &mut rng).unwrap();
        assert!(!cleared.active);

        let info = tag.info().unwrap();
        assert_eq!(info.alarm, Some(AlarmState::new(50.0)));
    }

    #[test]
    fn test_tick_leaves_unsimulated_alarm_alone() {
        let tag = float_tag(1.0, Some(50.0));
        let mut rng = StdRng::seed_from_u64(1);

        tag.write(&TagValue::Float(75.0), at(2)).unwrap();
        assert_eq!(tag.tick(at(3), &mut rng), None);
        assert_eq!(tag.tick(at(4), &mut rng), None);

        let info = tag.info().unwrap();
        assert_eq!(info.value, TagValue::Float(75.0));
        assert_eq!(info.last_update, at(2));
        assert_eq!(info.alarm, Some(AlarmState::new(50.0)));
    }

    #[test]
    fn test_tick_with_wide_random_range_does_not_panic() {
        let tag = Tag::new(
            TagKey::new("simulation", "Wide"),
            &TagValue::Double(1.0),
            Simulation::Random {
                min: -1e308,
                max: 1e308,
            },
            None,
            at(0),
        )
        .unwrap();

        assert_eq!(tag.tick(at(1), &mut StdRng::seed_from_u64(1)), None);
        assert_eq!(tag.read().unwrap(), TagValue::Double(1.0));
        assert!(!tag.state.is_poisoned());
    }

    #[test]
    fn test_poisoned_lock_still_usable() {
        use std::sync::Arc;

        let tag = Arc::new(float_tag(3.0, None));
        let poisoner = tag.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the tag lock");
        })
        .join();

        assert!(tag.state.is_poisoned());
        assert_eq!(tag.read().unwrap(), TagValue::Float(3.0));
        tag.write(&TagValue::Float(4.0), at(1)).unwrap();
        assert_eq!(tag.read().unwrap(), TagValue::Float(4.0));
    }
}
