//! Page-side view of the rule engine worker.
//!
//! `SyncTracker` checks that outbound messages follow the restore handshake
//! and notices when a session has gone quiet. The worker never reports
//! failures itself, so a stalled handshake is the only signal a page gets.
//! `RuleEngineHost` spawns the browser worker; native hosts and tests use
//! `spawn_local_worker` instead.

use std::time::Duration;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use web_time::Instant;

use crate::messages::WorkerOutput;

/// Where the page is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    AwaitingInit,
    AwaitingRestore,
    AwaitingBatch,
    AwaitingSyncComplete,
    Live,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::AwaitingInit => "awaiting init",
            SyncStage::AwaitingRestore => "awaiting restoreState",
            SyncStage::AwaitingBatch => "awaiting applyRestoreBatchedFieldChanges",
            SyncStage::AwaitingSyncComplete => "awaiting sync-complete",
            SyncStage::Live => "live",
        }
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum ProtocolViolation {
    #[error("unexpected {message} while {stage}")]
    #[diagnostic(
        code(forms::host::out_of_order),
        help("the worker sends init, restoreState, applyRestoreBatchedFieldChanges and sync-complete in that order")
    )]
    OutOfOrder {
        message: String,
        stage: &'static str,
    },
}

/// Mirrors the worker's handshake from the receiving side.
#[derive(Debug)]
pub struct SyncTracker {
    stage: SyncStage,
    state: Option<Value>,
    last_progress: Instant,
    live_changes: usize,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        Self {
            stage: SyncStage::AwaitingInit,
            state: None,
            last_progress: Instant::now(),
            live_changes: 0,
        }
    }

    /// Record `msg`, rejecting anything the handshake does not allow yet.
    ///
    /// A rejected message leaves the tracker untouched.
    pub fn observe(&mut self, msg: &WorkerOutput) -> Result<(), ProtocolViolation> {
        let next = match (msg, self.stage) {
            // A fresh `init` starts a new session whatever came before.
            (WorkerOutput::Init(state), _) => {
                self.state = Some(state.clone());
                SyncStage::AwaitingRestore
            }
            (WorkerOutput::RestoreState { state, .. }, SyncStage::AwaitingRestore) => {
                self.state = Some(state.clone());
                SyncStage::AwaitingBatch
            }
            (WorkerOutput::ApplyRestoreBatchedFieldChanges { .. }, SyncStage::AwaitingBatch) => {
                SyncStage::AwaitingSyncComplete
            }
            (WorkerOutput::SyncComplete, SyncStage::AwaitingSyncComplete) => SyncStage::Live,
            (
                WorkerOutput::ApplyLiveFieldChange(_) | WorkerOutput::ApplyLiveFormChange(_),
                SyncStage::Live,
            ) => {
                self.live_changes += 1;
                SyncStage::Live
            }
            (WorkerOutput::Dispatch(_), stage) => stage,
            (msg, stage) => {
                return Err(ProtocolViolation::OutOfOrder {
                    message: msg.name().to_string(),
                    stage: stage.as_str(),
                });
            }
        };
        self.stage = next;
        self.last_progress = Instant::now();
        Ok(())
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub fn is_live(&self) -> bool {
        self.stage == SyncStage::Live
    }

    /// Latest full snapshot, from `init` or `restoreState`.
    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    pub fn live_changes(&self) -> usize {
        self.live_changes
    }

    pub fn since_progress(&self) -> Duration {
        self.last_progress.elapsed()
    }

    /// True once the handshake has been started and then made no progress
    /// for `timeout`.
    pub fn stalled(&self, timeout: Duration) -> bool {
        !matches!(self.stage, SyncStage::AwaitingInit | SyncStage::Live)
            && self.since_progress() >= timeout
    }
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
mod local {
    use futures_util::stream;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use crate::fetch::DataFetcher;
    use crate::functions::FunctionRegistrar;
    use crate::messages::{WorkerInput, WorkerOutput};
    use crate::model::FormModelFactory;
    use crate::router::Outbox;
    use crate::worker::RuleEngineWorker;

    /// Channel ends of a worker running on the current thread.
    pub struct LocalWorker {
        pub commands: mpsc::UnboundedSender<WorkerInput>,
        pub outputs: mpsc::UnboundedReceiver<WorkerOutput>,
        pub task: JoinHandle<()>,
    }

    /// Run a worker as a local task. Must be called inside a `LocalSet`.
    ///
    /// The task ends when every command sender is dropped.
    pub fn spawn_local_worker<F, D, R>(factory: F, fetcher: D, registrar: R) -> LocalWorker
    where
        F: FormModelFactory + 'static,
        D: DataFetcher + 'static,
        R: FunctionRegistrar + 'static,
    {
        let (outbox, outputs) = Outbox::channel();
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn_local(async move {
            let mut worker = RuleEngineWorker::new(factory, fetcher, registrar, outbox);
            let inputs = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|msg| (msg, rx))
            });
            worker.run(inputs).await;
        });
        LocalWorker {
            commands,
            outputs,
            task,
        }
    }
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub use local::{LocalWorker, spawn_local_worker};

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
mod bridge {
    use futures_util::stream::SplitSink;
    use futures_util::{SinkExt, StreamExt};
    use gloo_worker::Spawnable;
    use gloo_worker::reactor::ReactorBridge;
    use serde_json::Value;

    use super::SyncTracker;
    use crate::messages::{WorkerInput, WorkerOutput};
    use crate::reactor::{JsonCodec, RuleEngineReactor};

    type WorkerSink = SplitSink<ReactorBridge<RuleEngineReactor>, WorkerInput>;

    /// Spawns the rule engine worker and feeds its output to a callback.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut host = RuleEngineHost::spawn("/rule_engine_worker.js", |output| {
    ///     match output {
    ///         WorkerOutput::RestoreState { state, field_changes } => { /* render */ }
    ///         WorkerOutput::ApplyLiveFieldChange(change) => { /* patch field */ }
    ///         _ => {}
    ///     }
    /// });
    /// host.init(definition, page_url, None).await;
    /// host.decorated().await;
    /// ```
    pub struct RuleEngineHost {
        sink: WorkerSink,
    }

    impl RuleEngineHost {
        /// Spawn the worker script at `worker_url`.
        ///
        /// Out-of-order messages are logged and still handed to `on_output`.
        pub fn spawn(worker_url: &str, mut on_output: impl FnMut(WorkerOutput) + 'static) -> Self {
            let bridge = RuleEngineReactor::spawner()
                .encoding::<JsonCodec>()
                .spawn(worker_url);
            let (sink, mut stream) = bridge.split();

            wasm_bindgen_futures::spawn_local(async move {
                let mut tracker = SyncTracker::new();
                while let Some(output) = stream.next().await {
                    if let Err(e) = tracker.observe(&output) {
                        tracing::warn!("Rule engine worker: {e}");
                    }
                    on_output(output);
                }
                tracing::debug!("rule engine worker closed");
            });

            Self { sink }
        }

        pub async fn init(&mut self, payload: Value, url: String, code_base_path: Option<String>) {
            self.send(WorkerInput::Init {
                payload,
                url,
                code_base_path,
            })
            .await;
        }

        pub async fn decorated(&mut self) {
            self.send(WorkerInput::Decorated).await;
        }

        async fn send(&mut self, msg: WorkerInput) {
            let name = msg.name();
            if let Err(e) = self.sink.send(msg).await {
                tracing::error!("Failed to send {name} to rule engine worker: {e}");
            }
        }
    }
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use bridge::RuleEngineHost;
