//! Simulator configuration
//!
//! Loaded from JSON; every field has a default so an empty object `{}` is a
//! valid configuration that runs the built-in demo tag set.

use crate::error::{TagError, TagResult};
use crate::simulation::Simulation;
use crate::tag_key::TagKey;
use crate::value::TagValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level simulator configuration
///
/// # Example
/// ```rust
/// use tagsim_core::SimulatorConfig;
///
/// let config = SimulatorConfig::default()
///     .max_tags(16)
///     .update_interval_ms(250)
///     .diagnostics_enabled(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Upper bound on the number of tags in the store
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Period of the update scheduler (milliseconds)
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,

    /// Period of the diagnostics reporter (milliseconds)
    #[serde(default = "default_diagnostics_interval")]
    pub diagnostics_interval_ms: u64,

    /// Whether the diagnostics reporter runs at all
    #[serde(default = "default_true")]
    pub diagnostics_enabled: bool,

    /// Alarm events buffered per subscriber before the oldest are dropped
    #[serde(default = "default_alarm_channel_capacity")]
    pub alarm_channel_capacity: usize,

    /// How long shutdown waits for each driver thread to exit (milliseconds)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,

    /// Tags to create at startup; empty means [`demo_tags`]
    #[serde(default)]
    pub tags: Vec<TagSpec>,
}

fn default_max_tags() -> usize {
    100
}

fn default_update_interval() -> u64 {
    1000
}

fn default_diagnostics_interval() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_alarm_channel_capacity() -> usize {
    64
}

fn default_shutdown_timeout() -> u64 {
    5000
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
            update_interval_ms: default_update_interval(),
            diagnostics_interval_ms: default_diagnostics_interval(),
            diagnostics_enabled: true,
            alarm_channel_capacity: default_alarm_channel_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout(),
            tags: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    /// Parses and validates a JSON document
    pub fn from_json_str(json: &str) -> TagResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file
    pub fn load(path: impl AsRef<Path>) -> TagResult<Self> {
        let path = path.as_ref();
        let context = format!("loading {}", path.display());
        let json = std::fs::read_to_string(path)
            .map_err(|e| TagError::from(e).with_context(&context))?;
        Self::from_json_str(&json).map_err(|e| e.with_context(&context))
    }

    pub fn validate(&self) -> TagResult<()> {
        let require_nonzero = |parameter: &str, value: u64| {
            if value == 0 {
                Err(TagError::InvalidConfiguration {
                    parameter: parameter.to_string(),
                    reason: "must be greater than zero".to_string(),
                })
            } else {
                Ok(())
            }
        };

        require_nonzero("max_tags", self.max_tags as u64)?;
        require_nonzero("update_interval_ms", self.update_interval_ms)?;
        require_nonzero("diagnostics_interval_ms", self.diagnostics_interval_ms)?;
        require_nonzero("alarm_channel_capacity", self.alarm_channel_capacity as u64)?;
        require_nonzero("shutdown_timeout_ms", self.shutdown_timeout_ms)?;

        if self.max_tags > u32::MAX as usize {
            return Err(TagError::InvalidConfiguration {
                parameter: "max_tags".to_string(),
                reason: format!("must not exceed {}", u32::MAX),
            });
        }

        Ok(())
    }

    /// The configured tags, or the demo set when none are listed
    pub fn tag_specs(&self, now: DateTime<Utc>) -> Vec<TagSpec> {
        if self.tags.is_empty() {
            demo_tags(now)
        } else {
            self.tags.clone()
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn diagnostics_interval(&self) -> Duration {
        Duration::from_millis(self.diagnostics_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Sets the tag capacity
    pub fn max_tags(mut self, max: usize) -> Self {
        self.max_tags = max;
        self
    }

    /// Sets the update scheduler period
    pub fn update_interval_ms(mut self, ms: u64) -> Self {
        self.update_interval_ms = ms;
        self
    }

    /// Sets the diagnostics reporter period
    pub fn diagnostics_interval_ms(mut self, ms: u64) -> Self {
        self.diagnostics_interval_ms = ms;
        self
    }

    /// Enables or disables the diagnostics reporter
    pub fn diagnostics_enabled(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    pub fn alarm_channel_capacity(mut self, capacity: usize) -> Self {
        self.alarm_channel_capacity = capacity;
        self
    }

    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Appends a tag to create at startup
    pub fn tag(mut self, spec: TagSpec) -> Self {
        self.tags.push(spec);
        self
    }
}

/// Description of one tag to create
///
/// ```json
/// {
///   "namespace": "simulation",
///   "name": "SineWave",
///   "initial": {"type": "float", "value": 0.0},
///   "simulation": {"kind": "sine_wave", "frequency": 0.1, "amplitude": 10.0, "offset": 0.0},
///   "alarm_threshold": 8.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSpec {
    pub namespace: String,
    pub name: String,
    pub initial: TagValue,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_threshold: Option<f64>,
}

impl TagSpec {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        initial: impl Into<TagValue>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            initial: initial.into(),
            simulation: Simulation::None,
            alarm_threshold: None,
        }
    }

    pub fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_alarm(mut self, threshold: f64) -> Self {
        self.alarm_threshold = Some(threshold);
        self
    }

    pub fn key(&self) -> TagKey {
        TagKey::new(self.namespace.as_str(), self.name.as_str())
    }
}

/// Namespace of the fixed-value demo tags
pub const BASIC_NAMESPACE: &str = "basic";

/// Namespace of the simulated demo tags
pub const SIMULATION_NAMESPACE: &str = "simulation";

/// The demo tag set: one fixed tag per payload kind plus four simulated tags
#[allow(clippy::approx_constant)]
pub fn demo_tags(now: DateTime<Utc>) -> Vec<TagSpec> {
    vec![
        TagSpec::new(BASIC_NAMESPACE, "Int32Variable", 42i32),
        TagSpec::new(BASIC_NAMESPACE, "UInt32Variable", 123u32)
            .with_simulation(Simulation::Counter { step: 1.0 }),
        TagSpec::new(BASIC_NAMESPACE, "FloatVariable", 3.14f32),
        TagSpec::new(BASIC_NAMESPACE, "DoubleVariable", 2.71828f64),
        TagSpec::new(BASIC_NAMESPACE, "BooleanVariable", true)
            .with_simulation(Simulation::SquareWave { period: 10.0 }),
        TagSpec::new(BASIC_NAMESPACE, "StringVariable", "Hello OPC UA World!"),
        TagSpec::new(BASIC_NAMESPACE, "DateTimeVariable", now),
        TagSpec::new(SIMULATION_NAMESPACE, "SineWave", 0.0f32).with_simulation(
            Simulation::SineWave {
                frequency: 0.1,
                amplitude: 10.0,
                offset: 0.0,
            },
        ),
        TagSpec::new(SIMULATION_NAMESPACE, "RandomInteger", 0i32).with_simulation(
            Simulation::Random {
                min: 0.0,
                max: 100.0,
            },
        ),
        TagSpec::new(SIMULATION_NAMESPACE, "RandomFloat", 0.0f32)
            .with_simulation(Simulation::Random { min: 0.0, max: 1.0 }),
        TagSpec::new(SIMULATION_NAMESPACE, "Counter", 0i32)
            .with_simulation(Simulation::Counter { step: 1.0 }),
    ]
}
