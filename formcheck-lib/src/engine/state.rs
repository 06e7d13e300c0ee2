//! State shared between an engine and the passes it spawned.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::running::{RunningBulkTask, RunningTask, RunningTasks};
use super::{EventSender, FieldsByRecord, PassId, ValidationEvent};
use crate::model::RecordId;
use crate::report::{RawReport, consolidate};
use crate::rule::RuleSet;

/// A record and the index of a rule scheduled for it.
pub(crate) type TaskKey = (RecordId, usize);

/// A raw report and the scheduling key that produced it.
#[derive(Debug)]
pub(crate) struct Collected {
    pub key: TaskKey,
    pub raw: RawReport,
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub active: bool,
    pub present: HashSet<RecordId>,
    /// Latest pass that scheduled each (record, rule).
    pub scheduled: HashMap<TaskKey, PassId>,
    pub running: RunningTasks,
    next_pass: u64,
}

impl EngineState {
    pub fn next_pass(&mut self) -> PassId {
        self.next_pass += 1;
        PassId(self.next_pass)
    }

    pub fn schedule(&mut self, pass: PassId, key: TaskKey) {
        self.scheduled.insert(key, pass);
    }

    /// Returns true if `pass` still owns `key` and its record is present.
    pub fn is_current(&self, pass: PassId, key: TaskKey) -> bool {
        self.active
            && self.present.contains(&key.0)
            && self.scheduled.get(&key) == Some(&pass)
    }

    /// Drop every scheduling entry of a removed record.
    pub fn forget(&mut self, record_id: RecordId) {
        self.scheduled.retain(|(id, _), _| *id != record_id);
    }

    pub fn deactivate(&mut self, reason: &str) {
        self.active = false;
        self.running.cancel_all(reason);
        self.scheduled.clear();
    }
}

/// Rules, state and event sender of one engine. Cheap to clone.
#[derive(Clone)]
pub(crate) struct EngineCore {
    pub rules: Arc<RuleSet>,
    state: Arc<Mutex<EngineState>>,
    events: EventSender,
}

impl EngineCore {
    pub fn new(rules: RuleSet, events: EventSender) -> Self {
        Self {
            rules: Arc::new(rules),
            state: Arc::new(Mutex::new(EngineState::default())),
            events,
        }
    }

    /// Lock the state. Never hold the guard across an await.
    pub fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send an event. Callers hold the state lock so events from different
    /// passes are ordered the way the state changed.
    pub fn emit(&self, event: ValidationEvent) {
        if self.events.send(event).is_err() {
            log::warn!("Validation event dropped, receiver is gone");
        }
    }

    pub fn is_current(&self, pass: PassId, key: TaskKey) -> bool {
        self.lock().is_current(pass, key)
    }

    pub fn register(&self, task: RunningTask) {
        self.lock().running.push(task);
    }

    pub fn unregister(&self, pass: PassId, key: TaskKey) {
        self.lock().running.remove(pass, key.0, key.1);
    }

    pub fn register_bulk(&self, task: RunningBulkTask) {
        self.lock().running.push_bulk(task);
    }

    pub fn unregister_bulk(&self, pass: PassId, rule: usize) {
        self.lock().running.remove_bulk(pass, rule);
    }

    /// Announce `fields` for `pass`, unless the engine was deactivated.
    pub fn announce(&self, pass: PassId, fields: FieldsByRecord) {
        let state = self.lock();
        if state.active && !fields.is_empty() {
            self.emit(ValidationEvent::Started { pass, fields });
        }
    }

    /// Consolidate what `pass` collected and emit it.
    ///
    /// Reports whose (record, rule) has since been rescheduled, or whose
    /// record is gone, are dropped. `settled` is narrowed to present records.
    pub fn finish(&self, pass: PassId, collected: Vec<Collected>, settled: FieldsByRecord) {
        let state = self.lock();
        if !state.active {
            log::trace!("Pass {pass} finished after deactivation, nothing emitted");
            return;
        }

        let kept = collected.into_iter().filter_map(|item| {
            if state.is_current(pass, item.key) {
                Some(item.raw)
            } else {
                log::trace!(
                    "Dropping stale \"{}\" report for record {} from pass {pass}",
                    item.raw.rule_name,
                    item.raw.record_id
                );
                None
            }
        });
        let reports = consolidate(kept);

        let settled: FieldsByRecord = settled
            .into_iter()
            .filter(|(id, _)| state.present.contains(id))
            .collect();

        if reports.is_empty() && settled.is_empty() {
            return;
        }
        self.emit(ValidationEvent::Done {
            pass,
            reports,
            settled,
        });
    }

    pub fn running_tasks(&self) -> usize {
        self.lock().running.len()
    }
}
