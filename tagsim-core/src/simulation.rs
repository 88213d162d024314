//! Simulation engine
//!
//! A [`Simulation`] describes how a tag's value evolves on every tick of the
//! update scheduler. [`advance`] is the pure step function: it takes the
//! current value, the alarm state and the wall-clock instant and returns what
//! the tag should become. It performs no I/O and takes no locks; the caller
//! holds the tag's lock around it and does any logging afterwards.
//!
//! Waveforms are functions of absolute time (seconds since the Unix epoch),
//! not of tick count, so a missed tick never shifts their phase. Counters are
//! the exception: they step once per call.

use crate::alarm::AlarmState;
use crate::error::{TagError, TagResult};
use crate::tag_key::TagKey;
use crate::value::{TagType, TagValue};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════
// SIMULATION DESCRIPTION
// ═══════════════════════════════════════════════════════════════════

/// Discriminant of [`Simulation`], used with the positional parameter form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    None,
    SineWave,
    Random,
    Counter,
    SquareWave,
}

/// How a tag's value changes on each tick
///
/// Serialized as `{"kind": "sine_wave", "frequency": 0.1, "amplitude": 10.0, "offset": 0.0}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Simulation {
    /// Value only changes through writes
    #[default]
    None,

    /// `amplitude * sin(2π * frequency * t / 60) + offset`, `t` in epoch seconds
    SineWave {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },

    /// Fresh uniform sample from `[min, max]` (inclusive) every tick
    Random { min: f64, max: f64 },

    /// `previous + step`, wrapping at the integer width
    Counter { step: f64 },

    /// `true` during the first half of each `period` seconds
    SquareWave { period: f64 },
}

impl Simulation {
    /// Builds a simulation from the positional three-parameter form.
    ///
    /// | kind        | p1        | p2        | p3     |
    /// |-------------|-----------|-----------|--------|
    /// | sine wave   | frequency | amplitude | offset |
    /// | random      | (unused)  | min       | max    |
    /// | counter     | step      |           |        |
    /// | square wave | period    |           |        |
    pub fn from_params(kind: SimulationKind, params: [f64; 3]) -> Self {
        let [p1, p2, p3] = params;
        match kind {
            SimulationKind::None => Simulation::None,
            SimulationKind::SineWave => Simulation::SineWave {
                frequency: p1,
                amplitude: p2,
                offset: p3,
            },
            SimulationKind::Random => Simulation::Random { min: p2, max: p3 },
            SimulationKind::Counter => Simulation::Counter { step: p1 },
            SimulationKind::SquareWave => Simulation::SquareWave { period: p1 },
        }
    }

    pub const fn kind(&self) -> SimulationKind {
        match self {
            Simulation::None => SimulationKind::None,
            Simulation::SineWave { .. } => SimulationKind::SineWave,
            Simulation::Random { .. } => SimulationKind::Random,
            Simulation::Counter { .. } => SimulationKind::Counter,
            Simulation::SquareWave { .. } => SimulationKind::SquareWave,
        }
    }

    /// Whether ticking this simulation changes a tag of the given kind.
    ///
    /// Combinations that return `false` are accepted at creation and simply
    /// leave the value alone.
    pub const fn applies_to(&self, tag_type: TagType) -> bool {
        match self {
            Simulation::None => false,
            Simulation::SineWave { .. } => tag_type.is_floating_point(),
            Simulation::Random { .. } => tag_type.is_integer() || tag_type.is_floating_point(),
            Simulation::Counter { .. } => tag_type.is_integer(),
            Simulation::SquareWave { .. } => matches!(tag_type, TagType::Boolean),
        }
    }

    /// Rejects parameters that would make [`advance`] panic or produce NaN
    /// for a tag of kind `tag_type`
    pub fn validate(&self, tag: &TagKey, tag_type: TagType) -> TagResult<()> {
        let invalid = |reason: &str| TagError::InvalidSimulation {
            tag: tag.to_string(),
            reason: reason.to_string(),
        };

        match *self {
            Simulation::None => Ok(()),
            Simulation::SineWave {
                frequency,
                amplitude,
                offset,
            } => {
                if !(frequency.is_finite() && amplitude.is_finite() && offset.is_finite()) {
                    return Err(invalid("sine wave parameters must be finite"));
                }
                Ok(())
            }
            Simulation::Random { min, max } => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err(invalid("random bounds must be finite"));
                }
                if min > max {
                    return Err(invalid("random min must not exceed max"));
                }
                let sampleable = match tag_type {
                    TagType::Float => float_range(min, max).is_some(),
                    TagType::Double => double_range(min, max).is_some(),
                    _ => true,
                };
                if !sampleable {
                    return Err(invalid("random range is too wide for the tag's payload"));
                }
                Ok(())
            }
            Simulation::Counter { step } => {
                if !step.is_finite() {
                    return Err(invalid("counter step must be finite"));
                }
                Ok(())
            }
            Simulation::SquareWave { period } => {
                if !(period.is_finite() && period > 0.0) {
                    return Err(invalid("square wave period must be positive"));
                }
                Ok(())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// STEP FUNCTION
// ═══════════════════════════════════════════════════════════════════

/// Result of one [`advance`] call
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Replacement value, `None` when the simulation leaves the tag alone
    pub value: Option<TagValue>,
    /// Level of the alarm after this step, `None` when the tag has no
    /// applicable alarm
    pub alarm_active: Option<bool>,
}

impl Advance {
    /// Returns the new alarm level if it differs from `previous`
    pub fn alarm_transition(&self, previous: Option<&AlarmState>) -> Option<bool> {
        match (self.alarm_active, previous) {
            (Some(now), Some(before)) if now != before.active => Some(now),
            _ => None,
        }
    }
}

/// Seconds since the Unix epoch, with sub-second precision
pub fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Computes the next value and alarm level for a tag.
///
/// Tags without a simulation are left entirely alone, alarm included. For
/// every other simulation the alarm is evaluated against the new value, or
/// against `current` when the simulation does not apply to the payload.
/// Only `Float` payloads are compared against a threshold.
pub fn advance<R: Rng + ?Sized>(
    simulation: &Simulation,
    current: &TagValue,
    alarm: Option<&AlarmState>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Advance {
    if matches!(simulation, Simulation::None) {
        return Advance {
            value: None,
            alarm_active: None,
        };
    }

    let value = next_value(simulation, current, now, rng);

    let alarm_active = alarm.and_then(|alarm| {
        let checked = value.as_ref().unwrap_or(current);
        match checked {
            TagValue::Float(v) => Some(f64::from(*v) > alarm.threshold),
            _ => None,
        }
    });

    Advance {
        value,
        alarm_active,
    }
}

fn next_value<R: Rng + ?Sized>(
    simulation: &Simulation,
    current: &TagValue,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<TagValue> {
    match (*simulation, current) {
        (Simulation::None, _) => None,

        (
            Simulation::SineWave {
                frequency,
                amplitude,
                offset,
            },
            TagValue::Float(_) | TagValue::Double(_),
        ) => {
            let phase = 2.0 * core::f64::consts::PI * frequency * epoch_seconds(now) / 60.0;
            let y = amplitude * phase.sin() + offset;
            Some(match current {
                TagValue::Float(_) => TagValue::Float(y as f32),
                _ => TagValue::Double(y),
            })
        }

        (Simulation::Random { min, max }, TagValue::Int32(_)) => {
            // Float-to-int `as` saturates, so lo <= hi is preserved
            let (lo, hi) = (min as i32, max as i32);
            Some(TagValue::Int32(rng.gen_range(lo..=hi)))
        }
        (Simulation::Random { min, max }, TagValue::UInt32(_)) => {
            let (lo, hi) = (min as u32, max as u32);
            Some(TagValue::UInt32(rng.gen_range(lo..=hi)))
        }
        (Simulation::Random { min, max }, TagValue::Float(_)) => {
            let range = float_range(min, max)?;
            Some(TagValue::Float(rng.gen_range(range)))
        }
        (Simulation::Random { min, max }, TagValue::Double(_)) => {
            let range = double_range(min, max)?;
            Some(TagValue::Double(rng.gen_range(range)))
        }

        (Simulation::Counter { step }, TagValue::Int32(v)) => {
            Some(TagValue::Int32(v.wrapping_add(step as i32)))
        }
        // Truncated to the payload width, so a step of -1 wraps to u32::MAX
        (Simulation::Counter { step }, TagValue::UInt32(v)) => {
            Some(TagValue::UInt32(v.wrapping_add(step as i64 as u32)))
        }

        (Simulation::SquareWave { period }, TagValue::Boolean(_)) => {
            let t = epoch_seconds(now).rem_euclid(period);
            Some(TagValue::Boolean(t < period / 2.0))
        }

        _ => None,
    }
}

// Uniform float sampling scales the width by 1 / (1 - EPSILON); that
// product has to stay finite or `rand` panics.

fn float_range(min: f64, max: f64) -> Option<core::ops::RangeInclusive<f32>> {
    let (lo, hi) = (min as f32, max as f32);
    let scaled = (hi - lo) / (1.0 - f32::EPSILON);
    (lo <= hi && scaled.is_finite()).then_some(lo..=hi)
}

fn double_range(min: f64, max: f64) -> Option<core::ops::RangeInclusive<f64>> {
    let scaled = (max - min) / (1.0 - f64::EPSILON);
    (min <= max && scaled.is_finite()).then_some(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(secs: i64, millis: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, millis * 1_000_000).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_counter_steps_once_per_advance() {
        let sim = Simulation::Counter { step: 1.0 };
        let mut value = TagValue::Int32(0);
        let mut rng = rng();

        // Wall-clock gaps between calls do not matter
        for secs in [0, 1, 100, 101, 5000] {
            value = advance(&sim, &value, None, at(secs, 0), &mut rng)
                .value
                .unwrap();
        }
        assert_eq!(value, TagValue::Int32(5));
    }

    #[test]
    fn test_counter_negative_step_and_wrap() {
        let down = Simulation::Counter { step: -1.0 };
        let mut rng = rng();

        let next = advance(&down, &TagValue::UInt32(0), None, at(0, 0), &mut rng);
        assert_eq!(next.value, Some(TagValue::UInt32(u32::MAX)));

        let up = Simulation::Counter { step: 1.0 };
        let next = advance(&up, &TagValue::Int32(i32::MAX), None, at(0, 0), &mut rng);
        assert_eq!(next.value, Some(TagValue::Int32(i32::MIN)));
    }

    #[test]
    fn test_sine_wave_bounded() {
        let sim = Simulation::SineWave {
            frequency: 0.1,
            amplitude: 10.0,
            offset: 0.0,
        };
        let mut rng = rng();

        for tick in 0..10_000i64 {
            let now = at(1_700_000_000 + tick, (tick as u32 * 37) % 1000);
            let out = advance(&sim, &TagValue::Float(0.0), None, now, &mut rng);
            let v = out.value.and_then(|v| v.as_f32()).unwrap();
            assert!((-10.0..=10.0).contains(&v), "tick {tick}: {v}");
        }
    }

    #[test]
    fn test_sine_wave_depends_on_absolute_time() {
        let sim = Simulation::SineWave {
            frequency: 1.0,
            amplitude: 1.0,
            offset: 5.0,
        };
        let mut rng = rng();

        // One full period is 60 seconds at frequency 1
        let a = advance(&sim, &TagValue::Double(0.0), None, at(15, 0), &mut rng);
        let b = advance(&sim, &TagValue::Double(123.0), None, at(75, 0), &mut rng);
        let (a, b) = (a.value.unwrap(), b.value.unwrap());
        assert!((a.as_f64().unwrap() - 6.0).abs() < 1e-9);
        assert!((a.as_f64().unwrap() - b.as_f64().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_square_wave() {
        let sim = Simulation::SquareWave { period: 10.0 };
        let mut rng = rng();
        let current = TagValue::Boolean(false);

        let high = advance(&sim, &current, None, at(1_000_000_003, 0), &mut rng);
        assert_eq!(high.value, Some(TagValue::Boolean(true)));

        let low = advance(&sim, &current, None, at(1_000_000_007, 500), &mut rng);
        assert_eq!(low.value, Some(TagValue::Boolean(false)));
    }

    #[test]
    fn test_random_within_inclusive_bounds() {
        let mut rng = rng();
        let ints = Simulation::Random {
            min: 0.0,
            max: 100.0,
        };
        let floats = Simulation::Random { min: 0.0, max: 1.0 };

        for _ in 0..1000 {
            let i = advance(&ints, &TagValue::Int32(0), None, at(0, 0), &mut rng)
                .value
                .and_then(|v| v.as_i32())
                .unwrap();
            assert!((0..=100).contains(&i));

            let f = advance(&floats, &TagValue::Float(0.0), None, at(0, 0), &mut rng)
                .value
                .and_then(|v| v.as_f32())
                .unwrap();
            assert!((0.0..=1.0).contains(&f));
        }

        let degenerate = Simulation::Random { min: 4.0, max: 4.0 };
        let v = advance(&degenerate, &TagValue::UInt32(0), None, at(0, 0), &mut rng);
        assert_eq!(v.value, Some(TagValue::UInt32(4)));
    }

    #[test]
    fn test_inapplicable_combinations_are_no_ops() {
        let mut rng = rng();
        let now = at(0, 0);
        let cases = [
            (Simulation::SquareWave { period: 10.0 }, TagValue::Int32(1)),
            (Simulation::Counter { step: 1.0 }, TagValue::Float(1.0)),
            (
                Simulation::SineWave {
                    frequency: 1.0,
                    amplitude: 1.0,
                    offset: 0.0,
                },
                TagValue::Boolean(true),
            ),
            (
                Simulation::Random { min: 0.0, max: 1.0 },
                TagValue::from("text"),
            ),
            (Simulation::Counter { step: 1.0 }, TagValue::DateTime(now)),
        ];

        for (sim, value) in cases {
            assert!(!sim.applies_to(value.tag_type()));
            assert_eq!(advance(&sim, &value, None, now, &mut rng).value, None);
        }
    }

    #[test]
    fn test_alarm_edge_triggered_once() {
        let mut alarm = AlarmState::new(5.0);
        let mut rng = rng();
        let values = [1.0f32, 3.0, 6.0, 7.0, 9.0, 8.0];
        let mut transitions = Vec::new();

        // Random over a single point yields exactly that value
        for v in values {
            let sim = Simulation::Random {
                min: f64::from(v),
                max: f64::from(v),
            };
            let step = advance(
                &sim,
                &TagValue::Float(0.0),
                Some(&alarm),
                at(0, 0),
                &mut rng,
            );
            if let Some(active) = step.alarm_transition(Some(&alarm)) {
                transitions.push(active);
            }
            alarm.active = step.alarm_active.unwrap();
        }

        assert_eq!(transitions, vec![true]);
    }

    #[test]
    fn test_no_simulation_skips_alarm() {
        let alarm = AlarmState::new(50.0);
        let step = advance(
            &Simulation::None,
            &TagValue::Float(75.0),
            Some(&alarm),
            at(0, 0),
            &mut rng(),
        );
        assert_eq!(step.value, None);
        assert_eq!(step.alarm_active, None);
        assert_eq!(step.alarm_transition(Some(&alarm)), None);
    }

    #[test]
    fn test_inapplicable_simulation_still_checks_alarm() {
        let alarm = AlarmState::new(50.0);
        let step = advance(
            &Simulation::Counter { step: 1.0 },
            &TagValue::Float(75.0),
            Some(&alarm),
            at(0, 0),
            &mut rng(),
        );
        assert_eq!(step.value, None);
        assert_eq!(step.alarm_transition(Some(&alarm)), Some(true));
    }

    #[test]
    fn test_alarm_ignored_for_double() {
        let alarm = AlarmState::new(0.0);
        let step = advance(
            &Simulation::Random {
                min: 100.0,
                max: 100.0,
            },
            &TagValue::Double(100.0),
            Some(&alarm),
            at(0, 0),
            &mut rng(),
        );
        assert_eq!(step.alarm_active, None);
        assert_eq!(step.alarm_transition(Some(&alarm)), None);
    }

    #[test]
    fn test_validate() {
        let key = TagKey::new("simulation", "Bad");
        assert!(Simulation::Random { min: 2.0, max: 1.0 }
            .validate(&key, TagType::Int32)
            .is_err());
        assert!(Simulation::SquareWave { period: 0.0 }
            .validate(&key, TagType::Boolean)
            .is_err());
        assert!(Simulation::Counter { step: f64::NAN }
            .validate(&key, TagType::Int32)
            .is_err());
        assert!(Simulation::Counter { step: -3.0 }
            .validate(&key, TagType::Int32)
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_overflowing_random_ranges() {
        let key = TagKey::new("simulation", "Wide");
        let huge = Simulation::Random {
            min: -1e308,
            max: 1e308,
        };
        let beyond_f32 = Simulation::Random { min: 0.0, max: 1e39 };

        let err = huge.validate(&key, TagType::Double).unwrap_err();
        assert!(matches!(err, TagError::InvalidSimulation { .. }));
        assert!(beyond_f32.validate(&key, TagType::Float).is_err());

        // The same bounds are fine where they saturate to integers
        assert!(huge.validate(&key, TagType::Int32).is_ok());
        assert!(beyond_f32.validate(&key, TagType::Double).is_ok());
        assert!(Simulation::Random {
            min: f64::from(f32::MIN) / 4.0,
            max: f64::from(f32::MAX) / 4.0,
        }
        .validate(&key, TagType::Float)
        .is_ok());
    }

    #[test]
    fn test_unsampleable_random_range_is_a_no_op() {
        let mut rng = rng();
        let huge = Simulation::Random {
            min: -1e308,
            max: 1e308,
        };
        let beyond_f32 = Simulation::Random { min: 0.0, max: 1e39 };

        let double = advance(&huge, &TagValue::Double(1.0), None, at(0, 0), &mut rng);
        assert_eq!(double.value, None);
        let float = advance(&beyond_f32, &TagValue::Float(1.0), None, at(0, 0), &mut rng);
        assert_eq!(float.value, None);
    }

    #[test]
    fn test_uint32_counter_large_step_wraps() {
        let sim = Simulation::Counter {
            step: 3_000_000_000.0,
        };
        let current = TagValue::UInt32(2_000_000_000);
        let next = advance(&sim, &current, None, at(0, 0), &mut rng());
        assert_eq!(
            next.value,
            Some(TagValue::UInt32(2_000_000_000u32.wrapping_add(3_000_000_000)))
        );
    }

    #[test]
    fn test_from_params_positions() {
        assert_eq!(
            Simulation::from_params(SimulationKind::Random, [0.0, 1.0, 9.0]),
            Simulation::Random { min: 1.0, max: 9.0 }
        );
        let sine = Simulation::from_params(SimulationKind::SineWave, [0.1, 10.0, 0.0]);
        assert_eq!(sine.kind(), SimulationKind::SineWave);
    }

    #[test]
    fn test_json_shape() {
        let sim: Simulation = serde_json::from_str(
            r#"{"kind": "sine_wave", "frequency": 0.1, "amplitude": 10.0, "offset": 0.0}"#,
        )
        .unwrap();
        assert_eq!(sim.kind(), SimulationKind::SineWave);

        let none: Simulation = serde_json::from_str(r#"{"kind": "none"}"#).unwrap();
        assert_eq!(none, Simulation::None);
    }
}
