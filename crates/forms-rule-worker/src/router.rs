//! Phase-aware routing of rule engine change events.
//!
//! Every field change lands in exactly one place: the pre-restore batch, the
//! post-restore batch, or its own `applyLiveFieldChange` message.

use std::cell::RefCell;
use std::rc::Rc;

use forms_common::FormsError;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::messages::{FieldChange, WorkerOutput};
use crate::phase::Phase;

/// FIFO channel of messages headed for the page.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<WorkerOutput>,
}

impl Outbox {
    pub fn channel() -> (Outbox, mpsc::UnboundedReceiver<WorkerOutput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Outbox { tx }, rx)
    }

    /// Queue a message. A closed page side is logged, never raised: the
    /// worker has nobody left to report to.
    pub fn post(&self, msg: WorkerOutput) {
        if let Err(e) = self.tx.send(msg) {
            tracing::error!("Failed to send {} to page: channel closed", e.0.name());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Router shared between the session and the model's event handlers.
pub type SharedRouter = Rc<RefCell<ChangeRouter>>;

#[derive(Debug)]
pub struct ChangeRouter {
    phase: Phase,
    pre_restore: Vec<FieldChange>,
    post_restore: Vec<FieldChange>,
    outbox: Outbox,
}

impl ChangeRouter {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            phase: Phase::Uninitialized,
            pre_restore: Vec::new(),
            post_restore: Vec::new(),
            outbox,
        }
    }

    pub fn shared(outbox: Outbox) -> SharedRouter {
        Rc::new(RefCell::new(Self::new(outbox)))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Buffered record counts, pre-restore then post-restore.
    pub fn pending(&self) -> (usize, usize) {
        (self.pre_restore.len(), self.post_restore.len())
    }

    pub fn on_field_changed(&mut self, change: FieldChange) {
        match self.phase {
            // The model may report changes while it is still being built.
            Phase::Uninitialized | Phase::PreRestore => self.pre_restore.push(change),
            Phase::PostRestorePending => self.post_restore.push(change),
            Phase::Live => self.outbox.post(WorkerOutput::ApplyLiveFieldChange(change)),
        }
    }

    /// Form-level changes before live are already part of the restore snapshot.
    pub fn on_form_changed(&mut self, payload: Value) {
        if self.phase.is_live() {
            self.outbox.post(WorkerOutput::ApplyLiveFormChange(payload));
        } else {
            tracing::trace!(phase = %self.phase, "dropping form change before live");
        }
    }

    /// Model constructed; start collecting the pre-restore batch.
    pub fn begin(&mut self) -> Result<(), FormsError> {
        self.phase = self.phase.advance(Phase::PreRestore)?;
        Ok(())
    }

    /// Send `restoreState` with `state` and the whole pre-restore batch.
    pub fn restore(&mut self, state: Value) -> Result<(), FormsError> {
        self.phase = self.phase.advance(Phase::PostRestorePending)?;
        let field_changes = std::mem::take(&mut self.pre_restore);
        tracing::debug!(count = field_changes.len(), "sending restoreState");
        self.outbox.post(WorkerOutput::RestoreState {
            state,
            field_changes,
        });
        Ok(())
    }

    /// Send the post-restore batch and `sync-complete`, then go live.
    pub fn complete_restore(&mut self) -> Result<(), FormsError> {
        self.phase = self.phase.advance(Phase::Live)?;
        let field_changes = std::mem::take(&mut self.post_restore);
        tracing::debug!(
            count = field_changes.len(),
            "sending applyRestoreBatchedFieldChanges"
        );
        self.outbox
            .post(WorkerOutput::ApplyRestoreBatchedFieldChanges { field_changes });
        self.outbox.post(WorkerOutput::SyncComplete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(id: &str) -> FieldChange {
        FieldChange::from_payload(json!({ "field": { "id": id } }))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WorkerOutput>) -> Vec<WorkerOutput> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_each_bucket_gets_its_own_changes_in_order() {
        let (outbox, mut rx) = Outbox::channel();
        let mut router = ChangeRouter::new(outbox);

        router.begin().unwrap();
        router.on_field_changed(change("a"));
        router.on_field_changed(change("b"));
        router.restore(json!({ "s": 1 })).unwrap();
        router.on_field_changed(change("c"));
        router.complete_restore().unwrap();
        router.on_field_changed(change("d"));
        router.on_field_changed(change("e"));

        assert_eq!(
            drain(&mut rx),
            vec![
                WorkerOutput::RestoreState {
                    state: json!({ "s": 1 }),
                    field_changes: vec![change("a"), change("b")],
                },
                WorkerOutput::ApplyRestoreBatchedFieldChanges {
                    field_changes: vec![change("c")],
                },
                WorkerOutput::SyncComplete,
                WorkerOutput::ApplyLiveFieldChange(change("d")),
                WorkerOutput::ApplyLiveFieldChange(change("e")),
            ]
        );
        assert_eq!(router.pending(), (0, 0));
    }

    #[test]
    fn test_nothing_posted_before_restore() {
        let (outbox, mut rx) = Outbox::channel();
        let mut router = ChangeRouter::new(outbox);
        router.on_field_changed(change("early"));
        router.begin().unwrap();
        router.on_field_changed(change("a"));
        router.on_form_changed(json!({ "changes": [] }));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(router.pending(), (2, 0));
    }

    #[test]
    fn test_form_changes_only_when_live() {
        let (outbox, mut rx) = Outbox::channel();
        let mut router = ChangeRouter::new(outbox);
        router.begin().unwrap();
        router.on_form_changed(json!({ "n": 1 }));
        router.restore(json!({})).unwrap();
        router.on_form_changed(json!({ "n": 2 }));
        router.complete_restore().unwrap();
        drain(&mut rx);

        router.on_form_changed(json!({ "n": 3 }));
        assert_eq!(
            drain(&mut rx),
            vec![WorkerOutput::ApplyLiveFormChange(json!({ "n": 3 }))]
        );
    }

    #[test]
    fn test_empty_post_restore_batch_still_sent() {
        let (outbox, mut rx) = Outbox::channel();
        let mut router = ChangeRouter::new(outbox);
        router.begin().unwrap();
        router.restore(json!({})).unwrap();
        router.complete_restore().unwrap();
        let names: Vec<_> = drain(&mut rx).iter().map(|m| m.name().to_string()).collect();
        assert_eq!(
            names,
            ["restoreState", "applyRestoreBatchedFieldChanges", "sync-complete"]
        );
    }

    #[test]
    fn test_restore_twice_is_rejected() {
        let (outbox, mut rx) = Outbox::channel();
        let mut router = ChangeRouter::new(outbox);
        router.begin().unwrap();
        router.restore(json!({})).unwrap();
        assert!(router.restore(json!({})).is_err());
        router.complete_restore().unwrap();
        assert!(router.complete_restore().is_err());

        let sync_completes = drain(&mut rx)
            .into_iter()
            .filter(|m| *m == WorkerOutput::SyncComplete)
            .count();
        assert_eq!(sync_completes, 1);
    }

    #[test]
    fn test_closed_outbox_does_not_panic() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        assert!(outbox.is_closed());
        let mut router = ChangeRouter::new(outbox);
        router.begin().unwrap();
        router.restore(json!({})).unwrap();
        router.complete_restore().unwrap();
        router.on_field_changed(change("x"));
    }
}
