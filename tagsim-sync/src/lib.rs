//! # tagsim sync drivers
//!
//! Runs a [`tagsim_core::SimulatorContext`] on dedicated background threads.
//!
//! ## Overview
//!
//! Two periodic drivers share one context:
//!
//! - **Update scheduler**: once per update interval, steps every tag's
//!   simulation and publishes alarm transitions
//! - **Diagnostics reporter**: once per diagnostics interval, logs a
//!   statistics snapshot
//!
//! Each driver is a named OS thread hosting a current-thread Tokio runtime.
//! Callers never need an async context: reads and writes go through the
//! [`tagsim_core::AccessGateway`], alarms through a blocking
//! [`AlarmSubscriber`].
//!
//! ## Architecture
//!
//! ```text
//! Caller threads (sync) ──► AccessGateway ──► Tag locks ◄── update scheduler thread
//!                                                 │
//!                                  Statistics ◄───┴─── diagnostics thread
//!                                                 │
//!                 AlarmSubscriber ◄── broadcast ◄─┘
//! ```
//!
//! Shutdown order is fixed: signal stop, wait for the scheduler, wait for
//! diagnostics, destroy tags.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tagsim_core::{SimulatorConfig, SimulatorContext, TagKey};
//! use tagsim_sync::Simulator;
//!
//! # fn main() -> Result<(), tagsim_core::TagError> {
//! let ctx = SimulatorContext::new(SimulatorConfig::default())?;
//! let simulator = Simulator::start(ctx)?;
//!
//! let gateway = simulator.gateway()?;
//! let value = gateway.read_key(&TagKey::new("simulation", "SineWave"))?;
//! println!("SineWave = {}", value);
//! drop(gateway);
//!
//! let report = simulator.shutdown()?;
//! println!("destroyed {} tags", report.tags_destroyed);
//! # Ok(())
//! # }
//! ```

mod alarms;
mod diagnostics;
mod driver;
mod handle;
mod scheduler;

pub use alarms::AlarmSubscriber;
pub use diagnostics::DiagnosticsReporter;
pub use driver::{DriverExit, PeriodicDriver, PeriodicTask, RunState};
pub use handle::{ShutdownReport, ShutdownStep, Simulator};
pub use scheduler::UpdateScheduler;

// Re-export commonly used types from tagsim-core
pub use tagsim_core::{AccessGateway, TagError, TagResult};
