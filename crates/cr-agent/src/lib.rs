//! Carloop code reader agent: library crate.
//!
//! Re-exports all modules so external crates (e.g. `cr-e2e-tests`) can
//! drive the `Orchestrator` with mock buses and sinks.

pub mod config;
pub mod edge;
pub mod format;
pub mod mqtt_loop;
pub mod orchestrator;
pub mod report;
pub mod trigger;

pub use edge::CompletionEdgeTracker;
pub use orchestrator::{Orchestrator, RetriggerPolicy};
pub use report::{Report, ReportingSink, Reporter};
pub use trigger::{Command, TriggerSource};
