//! Interface to the rule engine's form model.
//!
//! The expression evaluator itself lives outside this crate. Browser builds
//! bind the JavaScript runtime; tests and native hosts plug in their own.

use std::future::Future;

use forms_common::{FormsError, LogLevel};
use serde_json::{Map, Value};

use crate::messages::FormDefinition;

/// Model event classes the worker listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    /// A single field's state changed.
    FieldChanged,
    /// A form-level property changed.
    Change,
}

impl ModelEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelEvent::FieldChanged => "fieldChanged",
            ModelEvent::Change => "change",
        }
    }
}

/// Receives the payload of every event of one class.
pub type EventHandler = Box<dyn FnMut(Value)>;

/// Forwards ad-hoc messages from the rule engine to the page.
pub type Dispatch = Box<dyn Fn(Value)>;

/// Stateful, rule-evaluating form model.
///
/// Handlers run synchronously inside whichever model call caused the change.
pub trait FormModel {
    fn subscribe(&mut self, event: ModelEvent, handler: EventHandler);

    /// Snapshot of the whole form; `include_internal` adds derived fields.
    fn state(&self, include_internal: bool) -> Value;

    /// Apply prefill data, re-running any rules it triggers.
    fn import_data(&mut self, data: Value) -> Result<(), FormsError>;

    /// Resolve once every pending asynchronous rule has settled.
    fn wait_for_promises(&mut self) -> impl Future<Output = ()>;

    fn properties(&self) -> Map<String, Value>;
}

/// Builds form models for new sessions.
///
/// The dispatch hook is part of construction, so a model can never
/// evaluate a rule before it exists. Custom functions are registered with the
/// rule engine before any model is built.
pub trait FormModelFactory {
    type Model: FormModel;

    fn create(
        &self,
        definition: &FormDefinition,
        log_level: LogLevel,
        dispatch: Dispatch,
    ) -> Result<Self::Model, FormsError>;
}
