//! Browser worker entry: gloo reactor, JSON codec and the JS rule engine.
//!
//! The form model is the `afb-runtime` JavaScript module shipped next to the
//! worker script. Values cross the boundary as JSON.

use forms_common::telemetry::{self, TelemetryConfig};
use forms_common::{FormsError, LogLevel, WorkerConfig};
use futures_util::{SinkExt, StreamExt};
use gloo_worker::Codec;
use gloo_worker::reactor::{ReactorScope, reactor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, UnwrapThrowExt};
use wasm_bindgen_futures::JsFuture;

use crate::fetch::HttpDataFetcher;
use crate::functions::FunctionRegistrar;
use crate::messages::{FormDefinition, WorkerInput, WorkerOutput, decode_message};
use crate::model::{Dispatch, EventHandler, FormModel, FormModelFactory, ModelEvent};
use crate::router::Outbox;
use crate::worker::RuleEngineWorker;

#[wasm_bindgen(raw_module = "./model/afb-runtime.js")]
extern "C" {
    type JsForm;

    #[wasm_bindgen(catch, js_name = createFormInstance)]
    fn create_form_instance(
        form_def: &JsValue,
        callback: &JsValue,
        log_level: &str,
    ) -> Result<JsForm, JsValue>;

    #[wasm_bindgen(method)]
    fn subscribe(this: &JsForm, handler: &js_sys::Function, event: &str);

    #[wasm_bindgen(method, js_name = getState)]
    fn get_state(this: &JsForm, include_internal: bool) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = importData)]
    fn import_data(this: &JsForm, data: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = waitForPromises)]
    fn wait_for_promises(this: &JsForm) -> js_sys::Promise;

    #[wasm_bindgen(method, getter)]
    fn properties(this: &JsForm) -> JsValue;

    #[wasm_bindgen(method, setter = dispatch)]
    fn set_dispatch(this: &JsForm, dispatch: &js_sys::Function);
}

#[wasm_bindgen(raw_module = "./functionRegistration.js")]
extern "C" {
    #[wasm_bindgen(catch, js_name = default)]
    fn register_custom_functions(
        path: &str,
        code_base_path: Option<String>,
    ) -> Result<js_sys::Promise, JsValue>;
}

fn to_js(value: &Value) -> Result<JsValue, FormsError> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text).map_err(|e| FormsError::Model(js_message(&e)))
}

fn from_js(value: &JsValue) -> Value {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}

fn js_message(err: &JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Messages between page and worker travel as plain JSON objects.
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<I>(input: I) -> JsValue
    where
        I: Serialize,
    {
        serde_json::to_string(&input)
            .ok()
            .and_then(|s| js_sys::JSON::parse(&s).ok())
            .unwrap_or(JsValue::NULL)
    }

    fn decode<O>(input: JsValue) -> O
    where
        O: for<'de> Deserialize<'de>,
    {
        let text = js_sys::JSON::stringify(&input)
            .ok()
            .and_then(|s| s.as_string())
            .unwrap_or_default();
        // Both message enums decode `{"name": "unknown"}`, so this only
        // throws for a message type without that fallback.
        decode_message(&text).expect_throw("message type has no unknown variant")
    }
}

/// A form instance from the JS runtime plus the closures it calls back into.
pub struct JsFormModel {
    form: JsForm,
    _dispatch: Closure<dyn Fn(JsValue)>,
    handlers: Vec<Closure<dyn FnMut(JsValue)>>,
}

impl FormModel for JsFormModel {
    fn subscribe(&mut self, event: ModelEvent, mut handler: EventHandler) {
        let closure = Closure::<dyn FnMut(JsValue)>::new(move |e: JsValue| {
            let payload =
                js_sys::Reflect::get(&e, &JsValue::from_str("payload")).unwrap_or(JsValue::NULL);
            handler(from_js(&payload));
        });
        self.form
            .subscribe(closure.as_ref().unchecked_ref(), event.as_str());
        self.handlers.push(closure);
    }

    fn state(&self, include_internal: bool) -> Value {
        from_js(&self.form.get_state(include_internal))
    }

    fn import_data(&mut self, data: Value) -> Result<(), FormsError> {
        let data = to_js(&data)?;
        self.form
            .import_data(&data)
            .map_err(|e| FormsError::Model(js_message(&e)))
    }

    async fn wait_for_promises(&mut self) {
        if let Err(e) = JsFuture::from(self.form.wait_for_promises()).await {
            tracing::warn!(error = %js_message(&e), "pending rule promise rejected");
        }
    }

    fn properties(&self) -> Map<String, Value> {
        match from_js(&self.form.properties()) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Builds models with the JS `createFormInstance`.
pub struct JsFormFactory;

impl FormModelFactory for JsFormFactory {
    type Model = JsFormModel;

    fn create(
        &self,
        definition: &FormDefinition,
        log_level: LogLevel,
        dispatch: Dispatch,
    ) -> Result<JsFormModel, FormsError> {
        let form_def = to_js(&definition.to_value())?;
        let form = create_form_instance(&form_def, &JsValue::UNDEFINED, log_level.as_str())
            .map_err(|e| FormsError::InvalidDefinition(js_message(&e)))?;

        let dispatch = Closure::<dyn Fn(JsValue)>::new(move |msg: JsValue| dispatch(from_js(&msg)));
        form.set_dispatch(dispatch.as_ref().unchecked_ref());

        Ok(JsFormModel {
            form,
            _dispatch: dispatch,
            handlers: Vec::new(),
        })
    }
}

/// Loads the form's custom functions module into the JS runtime.
pub struct JsFunctionRegistrar;

impl FunctionRegistrar for JsFunctionRegistrar {
    async fn register(
        &self,
        path: &str,
        code_base_path: Option<&str>,
    ) -> Result<(), FormsError> {
        let err = |e: JsValue| FormsError::CustomFunctions {
            path: path.to_string(),
            message: js_message(&e),
        };
        let promise = register_custom_functions(path, code_base_path.map(str::to_string))
            .map_err(err)?;
        JsFuture::from(promise).await.map_err(err)?;
        Ok(())
    }
}

fn worker_origin() -> Option<String> {
    let location = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("location")).ok()?;
    js_sys::Reflect::get(&location, &JsValue::from_str("origin"))
        .ok()?
        .as_string()
}

/// Rule engine reactor; one form session per spawned worker.
#[reactor]
pub async fn RuleEngineReactor(scope: ReactorScope<WorkerInput, WorkerOutput>) {
    telemetry::init(TelemetryConfig::for_level(
        "rule-engine-worker",
        LogLevel::default(),
    ));

    let config = match worker_origin().map(|origin| WorkerConfig::for_context(&origin)) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            tracing::error!(error = %e, "bad worker origin, using default config");
            WorkerConfig::default()
        }
        None => WorkerConfig::default(),
    };

    let (mut sink, commands) = scope.split();
    let (outbox, mut outputs) = Outbox::channel();

    wasm_bindgen_futures::spawn_local(async move {
        while let Some(msg) = outputs.recv().await {
            let name = msg.name().to_string();
            if let Err(e) = sink.send(msg).await {
                tracing::error!("Failed to send {name} to page: {e}");
            }
        }
    });

    let fetcher = HttpDataFetcher::from_config(&config);
    let mut worker = RuleEngineWorker::new(JsFormFactory, fetcher, JsFunctionRegistrar, outbox)
        .with_config(config);
    worker.run(commands).await;
}
