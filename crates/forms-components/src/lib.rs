//! forms-components: pure Rust models behind custom form widgets.
//!
//! The DOM wiring lives with the page; these types hold the masking,
//! validation and value composition so it can be tested without a browser.

pub mod date_picker;

pub use date_picker::{DateSegments, FieldView, InputOutcome, ModelUpdate, Segment};
