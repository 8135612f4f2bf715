//! Wire messages between the page and the rule engine worker.
//!
//! Both directions are JSON objects tagged by `name`. Outbound bodies travel
//! under `payload`; `sync-complete` has none.

use forms_common::{DEFAULT_CUSTOM_FUNCTIONS_PATH, FormsError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property that switches on prefill for a form.
pub const FORM_DATA_ENABLED: &str = "fd:formDataEnabled";

/// Commands from the page to the worker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "name")]
pub enum WorkerInput {
    /// Start a session for a form definition.
    #[serde(rename = "init")]
    Init {
        /// Form definition, possibly carrying the page's `search` string
        payload: Value,
        /// URL of the page the form is rendered on
        url: String,
        /// Base path custom function modules are resolved against
        #[serde(rename = "codeBasePath", default, skip_serializing_if = "Option::is_none")]
        code_base_path: Option<String>,
    },
    /// The page finished rendering the initial form.
    #[serde(rename = "decorated")]
    Decorated,
    /// Any command this worker does not understand.
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl WorkerInput {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerInput::Init { .. } => "init",
            WorkerInput::Decorated => "decorated",
            WorkerInput::Unknown => "unknown",
        }
    }
}

/// Decode a message, reading anything malformed as `{"name": "unknown"}`.
///
/// Both message enums accept that shape, so a page or worker that sends
/// something unexpected is logged and skipped instead of ending the worker.
pub fn decode_message<T: DeserializeOwned>(text: &str) -> Result<T, FormsError> {
    match serde_json::from_str(text) {
        Ok(msg) => Ok(msg),
        Err(e) => {
            tracing::warn!(error = %e, "undecodable message, treating it as unknown");
            Ok(serde_json::from_value(serde_json::json!({ "name": "unknown" }))?)
        }
    }
}

/// Messages from the worker to the page, in the order a session emits them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "name", content = "payload")]
pub enum WorkerOutput {
    /// Initial state snapshot, in reply to `init`.
    #[serde(rename = "init")]
    Init(Value),
    /// State after prefill settled, with every change collected before it.
    #[serde(rename = "restoreState")]
    RestoreState {
        state: Value,
        #[serde(rename = "fieldChanges")]
        field_changes: Vec<FieldChange>,
    },
    /// Changes that arrived while the page applied `restoreState`.
    #[serde(rename = "applyRestoreBatchedFieldChanges")]
    ApplyRestoreBatchedFieldChanges {
        #[serde(rename = "fieldChanges")]
        field_changes: Vec<FieldChange>,
    },
    /// No more batched messages follow.
    #[serde(rename = "sync-complete")]
    SyncComplete,
    #[serde(rename = "applyLiveFieldChange")]
    ApplyLiveFieldChange(FieldChange),
    #[serde(rename = "applyLiveFormChange")]
    ApplyLiveFormChange(Value),
    /// Ad-hoc message from the rule engine, forwarded as is.
    #[serde(untagged)]
    Dispatch(Value),
}

impl WorkerOutput {
    pub fn name(&self) -> &str {
        match self {
            WorkerOutput::Init(_) => "init",
            WorkerOutput::RestoreState { .. } => "restoreState",
            WorkerOutput::ApplyRestoreBatchedFieldChanges { .. } => {
                "applyRestoreBatchedFieldChanges"
            }
            WorkerOutput::SyncComplete => "sync-complete",
            WorkerOutput::ApplyLiveFieldChange(_) => "applyLiveFieldChange",
            WorkerOutput::ApplyLiveFormChange(_) => "applyLiveFormChange",
            WorkerOutput::Dispatch(msg) => msg.get("name").and_then(Value::as_str).unwrap_or(""),
        }
    }
}

/// One field's state delta, kept exactly as the rule engine reported it.
///
/// The record is never reshaped: the page receives the same JSON the model
/// emitted, including keys this crate does not know about.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct FieldChange(Value);

impl FieldChange {
    pub fn from_payload(payload: Value) -> Self {
        Self(payload)
    }

    /// Field state after the change.
    pub fn field(&self) -> Option<&Value> {
        self.0.get("field")
    }

    pub fn field_id(&self) -> Option<&str> {
        self.field()?.get("id")?.as_str()
    }

    /// Per-property entries, `{ propertyName, prevValue?, currentValue }`.
    pub fn changes(&self) -> impl Iterator<Item = &Value> {
        self.0
            .get("changes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// The entry for `property`, if this record carries one.
    pub fn property(&self, property: &str) -> Option<&Value> {
        self.changes()
            .find(|c| c.get("propertyName").and_then(Value::as_str) == Some(property))
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

impl From<Value> for FieldChange {
    fn from(payload: Value) -> Self {
        Self(payload)
    }
}

/// Form definition as received from the page.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDefinition {
    raw: Map<String, Value>,
}

impl FormDefinition {
    /// Split an `init` payload into the definition and the page's `search`
    /// string, which is session data and never reaches the rule engine.
    pub fn split_init_payload(payload: Value) -> Result<(Self, Option<String>), FormsError> {
        let Value::Object(mut raw) = payload else {
            return Err(FormsError::InvalidDefinition(
                "form definition must be a JSON object".into(),
            ));
        };
        let search = match raw.remove("search") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        Ok((Self { raw }, search))
    }

    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.raw.get("properties").and_then(Value::as_object)
    }

    /// Path of the custom functions module this form wants.
    pub fn custom_functions_path(&self) -> &str {
        self.properties()
            .and_then(|p| p.get("customFunctionsPath"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CUSTOM_FUNCTIONS_PATH)
    }

    /// Prefill runs only when the flag is literally `true`.
    pub fn form_data_enabled(&self) -> bool {
        form_data_enabled(self.properties())
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

pub(crate) fn form_data_enabled(properties: Option<&Map<String, Value>>) -> bool {
    properties.and_then(|p| p.get(FORM_DATA_ENABLED)) == Some(&Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_init_command() {
        let msg: WorkerInput = serde_json::from_value(json!({
            "name": "init",
            "payload": { "id": "f1", "search": "?a=1" },
            "url": "https://forms.example/form.html",
            "codeBasePath": "/blocks/form"
        }))
        .unwrap();
        assert_eq!(
            msg,
            WorkerInput::Init {
                payload: json!({ "id": "f1", "search": "?a=1" }),
                url: "https://forms.example/form.html".into(),
                code_base_path: Some("/blocks/form".into()),
            }
        );
    }

    #[test]
    fn test_parse_decorated_command() {
        let msg: WorkerInput = serde_json::from_value(json!({ "name": "decorated" })).unwrap();
        assert_eq!(msg, WorkerInput::Decorated);
        assert_eq!(msg.name(), "decorated");
    }

    #[test]
    fn test_unknown_command_names_decode() {
        let msg: WorkerInput = serde_json::from_value(json!({ "name": "ping", "x": 1 })).unwrap();
        assert_eq!(msg, WorkerInput::Unknown);
        assert_eq!(msg.name(), "unknown");
    }

    #[test]
    fn test_malformed_messages_decode_as_unknown() {
        for text in ["\"hello\"", "{}", "null", "{\"name\": 3}", "not json"] {
            let msg: WorkerInput = decode_message(text).unwrap();
            assert_eq!(msg, WorkerInput::Unknown, "{text}");
        }
        let msg: WorkerInput = decode_message(r#"{"name":"decorated"}"#).unwrap();
        assert_eq!(msg, WorkerInput::Decorated);

        let out: WorkerOutput = decode_message("not json").unwrap();
        assert_eq!(out.name(), "unknown");
    }

    #[test]
    fn test_outbound_wire_shapes() {
        let change = FieldChange::from_payload(json!({
            "field": { "id": "name" },
            "changes": [{ "propertyName": "value", "prevValue": null, "currentValue": "Ada" }]
        }));

        let restore = WorkerOutput::RestoreState {
            state: json!({ "id": "f1" }),
            field_changes: vec![change.clone()],
        };
        assert_eq!(
            serde_json::to_value(&restore).unwrap(),
            json!({
                "name": "restoreState",
                "payload": {
                    "state": { "id": "f1" },
                    "fieldChanges": [{
                        "field": { "id": "name" },
                        "changes": [{
                            "propertyName": "value",
                            "prevValue": null,
                            "currentValue": "Ada"
                        }]
                    }]
                }
            })
        );

        assert_eq!(
            serde_json::to_value(WorkerOutput::SyncComplete).unwrap(),
            json!({ "name": "sync-complete" })
        );
        assert_eq!(
            serde_json::to_value(WorkerOutput::ApplyLiveFormChange(json!({ "changes": [] })))
                .unwrap(),
            json!({ "name": "applyLiveFormChange", "payload": { "changes": [] } })
        );
    }

    #[test]
    fn test_dispatch_is_forwarded_unchanged() {
        let raw = json!({ "name": "submitSuccess", "payload": { "status": 200 } });
        let msg = WorkerOutput::Dispatch(raw.clone());
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
        assert_eq!(msg.name(), "submitSuccess");
    }

    #[test]
    fn test_field_change_forwarded_as_reported() {
        let payloads = [
            // `prevValue` is left out when the runtime's old value was undefined
            json!({
                "field": { "id": "age", "value": 5 },
                "changes": [{ "propertyName": "value", "currentValue": 5 }]
            }),
            json!({
                "field": { "id": "age", "dataRef": "$.x" },
                "changes": [{
                    "propertyName": "value",
                    "prevValue": 4,
                    "currentValue": 5,
                    "dataRef": "$.x"
                }],
                "source": "importData"
            }),
            json!({ "field": { "id": "panel" } }),
            json!({ "changes": [{ "currentValue": 5 }] }),
            json!("weird"),
        ];
        for payload in payloads {
            let live = WorkerOutput::ApplyLiveFieldChange(FieldChange::from_payload(payload.clone()));
            assert_eq!(serde_json::to_value(&live).unwrap()["payload"], payload);

            let batch = WorkerOutput::ApplyRestoreBatchedFieldChanges {
                field_changes: vec![FieldChange::from_payload(payload.clone())],
            };
            assert_eq!(
                serde_json::to_value(&batch).unwrap()["payload"]["fieldChanges"][0],
                payload
            );
        }
    }

    #[test]
    fn test_field_change_accessors() {
        let change = FieldChange::from_payload(json!({
            "field": { "id": "age" },
            "changes": [
                { "propertyName": "visible", "currentValue": true },
                { "propertyName": "value", "currentValue": 5 }
            ]
        }));
        assert_eq!(change.field_id(), Some("age"));
        assert_eq!(change.changes().count(), 2);
        assert_eq!(
            change.property("value").and_then(|c| c.get("currentValue")),
            Some(&json!(5))
        );
        assert!(change.property("enabled").is_none());

        let odd = FieldChange::from_payload(json!({ "changes": "none" }));
        assert_eq!(odd.field_id(), None);
        assert_eq!(odd.changes().count(), 0);
    }

    #[test]
    fn test_split_init_payload_strips_search() {
        let (def, search) = FormDefinition::split_init_payload(json!({
            "id": "loan",
            "search": "?prefillId=42",
            "properties": {
                "fd:formDataEnabled": true,
                "customFunctionsPath": "/custom.js"
            }
        }))
        .unwrap();
        assert_eq!(search.as_deref(), Some("?prefillId=42"));
        assert!(def.as_json().get("search").is_none());
        assert_eq!(def.id(), Some("loan"));
        assert!(def.form_data_enabled());
        assert_eq!(def.custom_functions_path(), "/custom.js");
    }

    #[test]
    fn test_form_data_enabled_requires_literal_true() {
        for props in [json!({}), json!({ "fd:formDataEnabled": "true" }), json!({ "fd:formDataEnabled": false })] {
            let (def, _) =
                FormDefinition::split_init_payload(json!({ "id": "x", "properties": props }))
                    .unwrap();
            assert!(!def.form_data_enabled());
            assert_eq!(def.custom_functions_path(), "../functions.js");
        }
    }

    #[test]
    fn test_non_object_definition_rejected() {
        let err = FormDefinition::split_init_payload(json!([1, 2])).unwrap_err();
        assert!(matches!(err, FormsError::InvalidDefinition(_)));
    }
}
