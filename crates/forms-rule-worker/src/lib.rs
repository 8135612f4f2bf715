//! Rule engine web worker for adaptive forms.
//!
//! The worker owns a rule-evaluating form model and keeps the page's copy of
//! it in sync. A session runs a fixed handshake:
//!
//! 1. `init` builds the model and answers with its state.
//! 2. `decorated` prefills (when the form asks for it), waits for pending
//!    rules, then sends `restoreState` with every change seen so far.
//! 3. After one scheduling tick, `applyRestoreBatchedFieldChanges` carries the
//!    changes that arrived meanwhile, followed by `sync-complete`.
//! 4. From then on each change is streamed as it happens.
//!
//! Failures are logged and leave the session silent; the page side can watch
//! for that with [`host::SyncTracker`].

pub mod fetch;
pub mod functions;
pub mod host;
pub mod messages;
pub mod model;
pub mod phase;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub mod reactor;
pub mod router;
pub mod session;
pub mod worker;

pub use fetch::{DataFetcher, HttpDataFetcher};
pub use functions::{BuiltinRegistrar, FunctionRegistrar, Registration};
pub use host::{ProtocolViolation, SyncStage, SyncTracker};
pub use messages::{FieldChange, FormDefinition, WorkerInput, WorkerOutput};
pub use model::{FormModel, FormModelFactory, ModelEvent};
pub use phase::Phase;
pub use router::{ChangeRouter, Outbox};
pub use session::Session;
pub use worker::{RuleEngineWorker, next_tick};
