//! forms-functions: helpers that form rules can call.
//!
//! This crate provides:
//! - Pure helpers (`full_name`, `days_between`, `mask_mobile_number`, `join_array_fields`)
//! - `FunctionRegistry` - named functions over JSON arguments, handed to the rule engine
//! - `CountdownTimers` - owned registry of per-field countdowns

pub mod helpers;
pub mod registry;
pub mod timer;

pub use helpers::{days_between, full_name, join_array_fields, mask_mobile_number, parse_date};
pub use registry::{CustomFunction, FunctionError, FunctionRegistry};
pub use timer::{CountdownOptions, CountdownTimers, DEFAULT_COUNTDOWN_SECS, Tick, TickFormat};
