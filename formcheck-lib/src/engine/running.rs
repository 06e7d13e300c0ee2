//! Registry of in-flight async evaluations.

use super::PassId;
use crate::model::RecordId;
use crate::task::CancelHandle;

/// An async per-record evaluation.
#[derive(Debug)]
pub(crate) struct RunningTask {
    pub record_id: RecordId,
    pub rule: usize,
    pub pass: PassId,
    pub handle: CancelHandle,
}

/// An async bulk evaluation over a batch of records.
#[derive(Debug)]
pub(crate) struct RunningBulkTask {
    pub rule: usize,
    pub record_ids: Vec<RecordId>,
    pub pass: PassId,
    pub handle: CancelHandle,
}

#[derive(Debug, Default)]
pub(crate) struct RunningTasks {
    tasks: Vec<RunningTask>,
    bulk: Vec<RunningBulkTask>,
}

impl RunningTasks {
    /// Register a task, replacing any task for the same record and rule.
    pub fn push(&mut self, task: RunningTask) {
        self.cancel_where(
            |t| t.record_id == task.record_id && t.rule == task.rule,
            "replaced",
        );
        self.tasks.push(task);
    }

    /// Register a bulk task, replacing any task for the same rule that
    /// shares a record with it.
    pub fn push_bulk(&mut self, task: RunningBulkTask) {
        self.cancel_bulk_where(
            |t| t.rule == task.rule && t.record_ids.iter().any(|id| task.record_ids.contains(id)),
            "replaced",
        );
        self.bulk.push(task);
    }

    pub fn remove(&mut self, pass: PassId, record_id: RecordId, rule: usize) {
        self.tasks
            .retain(|t| !(t.pass == pass && t.record_id == record_id && t.rule == rule));
    }

    pub fn remove_bulk(&mut self, pass: PassId, rule: usize) {
        self.bulk.retain(|t| !(t.pass == pass && t.rule == rule));
    }

    /// Cancel and drop per-record tasks matching `pred`.
    pub fn cancel_where<F>(&mut self, pred: F, reason: &str) -> usize
    where
        F: Fn(&RunningTask) -> bool,
    {
        let (cancelled, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.tasks).into_iter().partition(|t| pred(t));
        self.tasks = kept;
        for task in &cancelled {
            task.handle.cancel(reason);
        }
        cancelled.len()
    }

    /// Cancel and drop bulk tasks matching `pred`, returning them.
    pub fn cancel_bulk_where<F>(&mut self, pred: F, reason: &str) -> Vec<RunningBulkTask>
    where
        F: Fn(&RunningBulkTask) -> bool,
    {
        let (cancelled, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.bulk).into_iter().partition(|t| pred(t));
        self.bulk = kept;
        for task in &cancelled {
            task.handle.cancel(reason);
        }
        cancelled
    }

    pub fn cancel_all(&mut self, reason: &str) {
        self.cancel_where(|_| true, reason);
        self.cancel_bulk_where(|_| true, reason);
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.bulk.len()
    }
}
