//! Restore protocol phases.

use std::fmt;

use forms_common::FormsError;
use serde::{Deserialize, Serialize};

/// Where a session is in the restore handshake.
///
/// Phases only move forward, one step at a time, and `Live` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// No `init` processed yet.
    #[default]
    Uninitialized,
    /// Model built; field changes are collected for `restoreState`.
    PreRestore,
    /// `restoreState` sent; changes are collected for the second batch.
    PostRestorePending,
    /// Every change is streamed to the page as it happens.
    Live,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Uninitialized => Some(Phase::PreRestore),
            Phase::PreRestore => Some(Phase::PostRestorePending),
            Phase::PostRestorePending => Some(Phase::Live),
            Phase::Live => None,
        }
    }

    /// Move to `to`, which must be the direct successor of `self`.
    pub fn advance(self, to: Phase) -> Result<Phase, FormsError> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(FormsError::Transition {
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::PreRestore => "pre-restore",
            Phase::PostRestorePending => "post-restore-pending",
            Phase::Live => "live",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Phase::Live)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
