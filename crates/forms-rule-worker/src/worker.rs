//! The rule engine worker: command loop, registration gate and sessions.

use forms_common::WorkerConfig;
use futures_util::{Stream, StreamExt};
use serde_json::Value;

use crate::fetch::DataFetcher;
use crate::functions::{FunctionRegistrar, Registration};
use crate::messages::WorkerInput;
use crate::model::FormModelFactory;
use crate::phase::Phase;
use crate::router::Outbox;
use crate::session::Session;

/// Yield for one scheduling tick.
///
/// In the browser this is a zero-delay timer, so the page's message queue
/// gets a turn. Natively it is a plain task yield. Neither bounds wall-clock
/// time.
pub async fn next_tick() {
    #[cfg(all(target_family = "wasm", target_os = "unknown"))]
    n0_future::time::sleep(std::time::Duration::ZERO).await;

    #[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
    tokio::task::yield_now().await;
}

enum Slot<M> {
    Empty,
    Active(Session<M>),
    /// A fatal error ended the session; nothing more is sent.
    Stalled,
}

/// Processes page commands one at a time against a single form session.
pub struct RuleEngineWorker<F: FormModelFactory, D, R> {
    factory: F,
    fetcher: D,
    registrar: R,
    outbox: Outbox,
    config: WorkerConfig,
    registration: Registration,
    held: Vec<WorkerInput>,
    session: Slot<F::Model>,
}

impl<F, D, R> RuleEngineWorker<F, D, R>
where
    F: FormModelFactory,
    D: DataFetcher,
    R: FunctionRegistrar,
{
    pub fn new(factory: F, fetcher: D, registrar: R, outbox: Outbox) -> Self {
        Self {
            factory,
            fetcher,
            registrar,
            outbox,
            config: WorkerConfig::default(),
            registration: Registration::Pending,
            held: Vec::new(),
            session: Slot::Empty,
        }
    }

    /// Fallback custom function locations for commands that carry none.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle every command from `commands` in arrival order.
    pub async fn run<S>(&mut self, commands: S)
    where
        S: Stream<Item = WorkerInput>,
    {
        let mut commands = std::pin::pin!(commands);
        while let Some(msg) = commands.next().await {
            self.handle(msg).await;
        }
        tracing::debug!("command stream closed");
    }

    /// Handle one command to completion.
    pub async fn handle(&mut self, msg: WorkerInput) {
        tracing::debug!(name = msg.name(), "worker received command");

        if matches!(msg, WorkerInput::Unknown) {
            tracing::warn!("unknown command, ignoring");
            return;
        }
        if self.registration.is_pending() {
            self.register_functions(&msg).await;
        }
        if !self.registration.is_ready() {
            tracing::warn!(
                name = msg.name(),
                held = self.held.len() + 1,
                "custom functions unavailable, holding command"
            );
            self.held.push(msg);
            return;
        }

        match msg {
            WorkerInput::Init { payload, url, .. } => self.init(payload, &url),
            WorkerInput::Decorated => self.decorated().await,
            WorkerInput::Unknown => {}
        }
    }

    /// Phase of the current session, if one was opened.
    pub fn phase(&self) -> Option<Phase> {
        match &self.session {
            Slot::Active(session) => Some(session.phase()),
            Slot::Empty | Slot::Stalled => None,
        }
    }

    pub fn session(&self) -> Option<&Session<F::Model>> {
        match &self.session {
            Slot::Active(session) => Some(session),
            Slot::Empty | Slot::Stalled => None,
        }
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self.session, Slot::Stalled)
    }

    /// Commands waiting on a custom function registration that failed.
    pub fn held_commands(&self) -> usize {
        self.held.len()
    }

    pub fn registration(&self) -> Registration {
        self.registration
    }

    async fn register_functions(&mut self, msg: &WorkerInput) {
        let (path, code_base_path) = match msg {
            WorkerInput::Init {
                payload,
                code_base_path,
                ..
            } => (
                payload
                    .get("properties")
                    .and_then(|p| p.get("customFunctionsPath"))
                    .and_then(Value::as_str),
                code_base_path.as_deref(),
            ),
            WorkerInput::Decorated | WorkerInput::Unknown => (None, None),
        };
        let path = path.unwrap_or(self.config.custom_functions_path.as_str());
        let code_base_path = code_base_path.or(self.config.code_base_path.as_deref());

        self.registration = match self.registrar.register(path, code_base_path).await {
            Ok(()) => {
                tracing::debug!(path, "custom functions registered");
                Registration::Ready
            }
            Err(e) => {
                tracing::error!(path, error = %e, "custom function registration failed");
                Registration::Failed
            }
        };
    }

    fn init(&mut self, payload: Value, url: &str) {
        if matches!(self.session, Slot::Stalled) {
            tracing::warn!("session stalled, ignoring init");
            return;
        }
        if matches!(self.session, Slot::Active(_)) {
            tracing::warn!("init received again, replacing the session");
        }
        self.session = match Session::open(&self.factory, payload, url, &self.outbox) {
            Ok(session) => Slot::Active(session),
            Err(e) => {
                tracing::error!(error = %e, "failed to open form session");
                Slot::Stalled
            }
        };
    }

    async fn decorated(&mut self) {
        let session = match &mut self.session {
            Slot::Active(session) => session,
            Slot::Empty => {
                tracing::warn!("decorated received before init, ignoring");
                return;
            }
            Slot::Stalled => {
                tracing::debug!("session stalled, ignoring decorated");
                return;
            }
        };
        if session.phase() != Phase::PreRestore {
            tracing::warn!(phase = %session.phase(), "decorated already handled, ignoring");
            return;
        }

        let result = session.decorated(&self.fetcher).await;
        if let Err(e) = result {
            tracing::error!(error = %e, "restore sequence failed, session stalled");
            self.session = Slot::Stalled;
        }
    }
}
