//! One form session: a model, its definition and the restore handshake.

use forms_common::perf::TimingGuard;
use forms_common::telemetry;
use forms_common::{FormsError, LogLevel};
use serde_json::{Map, Value};

use crate::fetch::DataFetcher;
use crate::messages::{FieldChange, FormDefinition, WorkerOutput};
use crate::model::{Dispatch, FormModel, FormModelFactory, ModelEvent};
use crate::phase::Phase;
use crate::router::{ChangeRouter, Outbox, SharedRouter};
use crate::worker::next_tick;

pub struct Session<M> {
    model: M,
    definition: FormDefinition,
    search: Option<String>,
    router: SharedRouter,
}

impl<M: FormModel> Session<M> {
    /// Build the model for an `init` payload and post the `init` snapshot.
    pub fn open<F>(
        factory: &F,
        payload: Value,
        context_url: &str,
        outbox: &Outbox,
    ) -> Result<Self, FormsError>
    where
        F: FormModelFactory<Model = M>,
    {
        let (definition, search) = FormDefinition::split_init_payload(payload)?;
        let log_level = LogLevel::from_url(context_url);
        telemetry::set_level(log_level);
        tracing::debug!(form_id = ?definition.id(), %log_level, "creating form model");

        let router = ChangeRouter::shared(outbox.clone());
        let dispatch_outbox = outbox.clone();
        let dispatch: Dispatch =
            Box::new(move |msg| dispatch_outbox.post(WorkerOutput::Dispatch(msg)));
        let mut model = factory.create(&definition, log_level, dispatch)?;

        let fields = router.clone();
        model.subscribe(
            ModelEvent::FieldChanged,
            Box::new(move |payload| {
                fields
                    .borrow_mut()
                    .on_field_changed(FieldChange::from_payload(payload))
            }),
        );
        let form = router.clone();
        model.subscribe(
            ModelEvent::Change,
            Box::new(move |payload| form.borrow_mut().on_form_changed(payload)),
        );

        router.borrow_mut().begin()?;
        outbox.post(WorkerOutput::Init(model.state(true)));

        Ok(Self {
            model,
            definition,
            search,
            router,
        })
    }

    /// Run the restore handshake after the page has rendered the form.
    ///
    /// Prefill (when enabled) and settling happen before `restoreState`; the
    /// second batch is whatever arrives during one scheduling tick after it.
    pub async fn decorated<D: DataFetcher>(&mut self, fetcher: &D) -> Result<(), FormsError> {
        let _timing = TimingGuard::new("restore sequence");

        if self.definition.form_data_enabled() {
            let form_id = self.definition.id().unwrap_or_default();
            match fetcher.fetch(form_id, self.search.as_deref()).await? {
                Some(data) => self.model.import_data(data)?,
                None => tracing::debug!(form_id, "no prefill data"),
            }
        }

        self.model.wait_for_promises().await;

        let state = self.model.state(true);
        self.router.borrow_mut().restore(state)?;

        next_tick().await;

        self.router.borrow_mut().complete_restore()?;
        tracing::debug!("session live");
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.router.borrow().phase()
    }

    pub fn state(&self) -> Value {
        self.model.state(true)
    }

    pub fn properties(&self) -> Map<String, Value> {
        self.model.properties()
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }
}
