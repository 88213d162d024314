//! tagsim core: a concurrent typed-tag store with a simulation engine
//!
//! This crate holds the in-memory model of a simulated industrial data
//! source: a bounded set of typed tags, each behind its own lock, whose values
//! evolve on every tick according to a simulation function. External callers
//! read and write tags through the [`AccessGateway`]; alarm threshold
//! crossings are published as [`AlarmEvent`]s.
//!
//! No threads are spawned here. The periodic drivers that tick the store and
//! report diagnostics live in `tagsim-sync`.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use tagsim_core::{SimulatorConfig, SimulatorContext, TagKey, TagValue};
//!
//! let ctx = Arc::new(SimulatorContext::new(SimulatorConfig::default())?);
//! let gateway = ctx.gateway();
//!
//! let value = gateway.read_key(&TagKey::new("basic", "StringVariable"))?;
//! assert_eq!(value, TagValue::from("Hello OPC UA World!"));
//!
//! drop(gateway);
//! assert_eq!(ctx.teardown()?, 11);
//! # Ok::<(), tagsim_core::TagError>(())
//! ```

pub mod alarm;
pub mod config;
pub mod context;
mod error;
pub mod gateway;
pub mod simulation;
pub mod stats;
pub mod store;
pub mod tag;
mod tag_key;
pub mod time;
mod value;

pub use alarm::{AlarmEvent, AlarmState, AlarmTransition};
pub use config::{demo_tags, SimulatorConfig, TagSpec};
pub use context::SimulatorContext;
pub use error::{TagError, TagResult};
pub use gateway::{AccessGateway, ClientSession};
pub use simulation::{Simulation, SimulationKind};
pub use stats::{Statistics, StatsSnapshot};
pub use store::TagStore;
pub use tag::{Tag, TagInfo};
pub use tag_key::{TagHandle, TagKey};
pub use time::{ManualClock, TimestampProvider, WallClock};
pub use value::{TagType, TagValue};
