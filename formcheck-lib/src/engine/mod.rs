//! Validation engines.
//!
//! [`Validator`] evaluates a rule chain against one record. [`BulkValidator`]
//! does the same over a collection, adding rules that run once across many
//! records. Both announce work with [`ValidationEvent::Started`] before any
//! rule runs and deliver results in [`ValidationEvent::Done`] batches.
//!
//! Passes run as spawned tokio tasks, so engine methods must be called from
//! inside a tokio runtime.

mod bulk;
mod chain;
mod reconcile;
mod running;
mod single;
mod state;

pub use bulk::BulkValidator;
pub use single::Validator;

use std::collections::BTreeMap;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::model::RecordId;
use crate::report::Report;

/// Field names per record.
pub type FieldsByRecord = BTreeMap<RecordId, Vec<String>>;

/// Sending half of an engine's notification channel.
pub type EventSender = mpsc::UnboundedSender<ValidationEvent>;

/// Receiving half of an engine's notification channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ValidationEvent>;

/// Create a notification channel for an engine.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Identifies one evaluation pass. Later passes have larger ids; the
/// default id precedes every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u64);

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification sent by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationEvent {
    /// These fields are being (re)validated by `pass`.
    Started { pass: PassId, fields: FieldsByRecord },
    /// `pass` produced `reports` and is finished with the `settled` fields.
    Done {
        pass: PassId,
        reports: Vec<Report>,
        settled: FieldsByRecord,
    },
}

impl ValidationEvent {
    pub fn pass(&self) -> PassId {
        match self {
            Self::Started { pass, .. } | Self::Done { pass, .. } => *pass,
        }
    }
}

/// Handle to a running pass.
///
/// Dropping it detaches the pass; it keeps running.
#[derive(Debug)]
pub struct PassHandle {
    id: PassId,
    join: JoinHandle<Result<(), EngineError>>,
}

impl PassHandle {
    pub(crate) fn new(id: PassId, join: JoinHandle<Result<(), EngineError>>) -> Self {
        Self { id, join }
    }

    pub fn id(&self) -> PassId {
        self.id
    }

    /// Check if the pass has finished.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the pass to finish.
    ///
    /// Returns the error of a rule that failed in an unclassified way.
    pub async fn wait(self) -> Result<(), EngineError> {
        joined(self.join.await)
    }

    /// Take the result of a finished pass without waiting.
    ///
    /// Returns `None` while the pass is still running.
    pub fn try_wait(&mut self) -> Option<Result<(), EngineError>> {
        if !self.join.is_finished() {
            return None;
        }
        (&mut self.join).now_or_never().map(joined)
    }
}

fn joined(
    result: Result<Result<(), EngineError>, tokio::task::JoinError>,
) -> Result<(), EngineError> {
    match result {
        Ok(result) => result,
        Err(err) => Err(EngineError::Aborted(err.to_string())),
    }
}
