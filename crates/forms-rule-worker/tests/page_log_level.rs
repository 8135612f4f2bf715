//! The page's `afLogLevel` also drives the worker's own console output.
//!
//! Kept in its own test binary because it installs the global subscriber.

use forms_common::telemetry::{self, TelemetryConfig};
use forms_common::{FormsError, LogLevel};
use forms_rule_worker::model::{Dispatch, EventHandler};
use forms_rule_worker::{
    BuiltinRegistrar, DataFetcher, FormDefinition, FormModel, FormModelFactory, ModelEvent, Outbox,
    RuleEngineWorker, WorkerInput,
};
use serde_json::{Map, Value, json};
use tracing::level_filters::LevelFilter;

struct StaticModel;

impl FormModel for StaticModel {
    fn subscribe(&mut self, _event: ModelEvent, _handler: EventHandler) {}

    fn state(&self, _include_internal: bool) -> Value {
        json!({ "id": "loan" })
    }

    fn import_data(&mut self, _data: Value) -> Result<(), FormsError> {
        Ok(())
    }

    async fn wait_for_promises(&mut self) {}

    fn properties(&self) -> Map<String, Value> {
        Map::new()
    }
}

struct StaticFactory;

impl FormModelFactory for StaticFactory {
    type Model = StaticModel;

    fn create(
        &self,
        _definition: &FormDefinition,
        _log_level: LogLevel,
        _dispatch: Dispatch,
    ) -> Result<StaticModel, FormsError> {
        Ok(StaticModel)
    }
}

struct NoData;

impl DataFetcher for NoData {
    async fn fetch(&self, _form_id: &str, _search: Option<&str>) -> Result<Option<Value>, FormsError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_init_url_sets_worker_log_level() {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    telemetry::init(TelemetryConfig::for_level("rule-engine-worker", LogLevel::default()));
    assert_eq!(telemetry::current_level(), Some(LevelFilter::ERROR));
    assert!(!tracing::enabled!(tracing::Level::WARN));

    let (outbox, _rx) = Outbox::channel();
    let mut worker = RuleEngineWorker::new(StaticFactory, NoData, BuiltinRegistrar::new(), outbox);
    worker
        .handle(WorkerInput::Init {
            payload: json!({ "id": "loan" }),
            url: "https://forms.example/content/loan.html?afLogLevel=debug".into(),
            code_base_path: None,
        })
        .await;

    assert_eq!(telemetry::current_level(), Some(LevelFilter::DEBUG));
    assert!(tracing::enabled!(tracing::Level::DEBUG));
}
