//! forms-common: shared plumbing for the forms runtime crates.
//!
//! This crate provides:
//! - `FormsError` and friends, with `miette` diagnostics
//! - `LogLevel` selection from the form page URL
//! - `WorkerConfig` for the rule engine worker
//! - Timing helpers and (behind `telemetry`) tracing setup

pub mod config;
pub mod error;
pub mod log_level;
pub mod perf;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::config::{DEFAULT_CUSTOM_FUNCTIONS_PATH, WorkerConfig};
pub use crate::error::{ConfigError, FormsError, SerDeError};
pub use crate::log_level::{LOG_LEVEL_PARAM, LogLevel};
