use std::collections::{BTreeMap, HashSet};

use super::chain::run_chain;
use super::state::EngineCore;
use super::{EventSender, PassHandle};
use crate::error::SetupError;
use crate::model::Record;
use crate::rule::{Rule, RuleSet};

/// Validation engine for a single record.
///
/// On activation every rule runs. Afterwards only rules targeting a changed
/// field run again, and async rules still running for those rules are
/// cancelled first.
pub struct Validator {
    core: EngineCore,
    record: Option<Record>,
    enabled: bool,
}

impl Validator {
    /// Create an engine that sends its notifications to `events`.
    ///
    /// Bulk rules are rejected.
    pub fn new(rules: Vec<Rule>, events: EventSender) -> Result<Self, SetupError> {
        let rules = RuleSet::per_record(rules)?;
        Ok(Self {
            core: EngineCore::new(rules, events),
            record: None,
            enabled: true,
        })
    }

    /// Turn validation on or off. While off, changes are not validated and
    /// the last validated record is kept as the diff base.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The record as of the last scheduled pass.
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.core.rules
    }

    /// Number of async evaluations in flight.
    pub fn running_tasks(&self) -> usize {
        self.core.running_tasks()
    }

    /// Start validating `record` with every rule.
    pub fn activate(&mut self, record: Record) -> Option<PassHandle> {
        {
            let mut state = self.core.lock();
            state.active = true;
            state.present = HashSet::from([record.id()]);
        }
        if !self.enabled {
            // Nothing was validated, so the next enabled change runs every rule
            self.record = None;
            return None;
        }
        self.record = Some(record.clone());
        let rules = self.core.rules.all();
        Some(self.start(record, rules))
    }

    /// Validate what changed between the current record and `next`.
    ///
    /// A record with a different id is treated as a fresh activation.
    /// Returns `None` when no rule is affected.
    pub fn on_record_changed(&mut self, next: Record) -> Option<PassHandle> {
        let Some(prev) = &self.record else {
            return self.activate(next);
        };
        if prev.id() != next.id() {
            self.deactivate();
            return self.activate(next);
        }
        if !self.enabled {
            return None;
        }

        let changed = next.changed_fields(prev);
        let rules = self.core.rules.affected_by(&changed);
        self.record = Some(next.clone());

        if rules.is_empty() {
            return None;
        }
        Some(self.start(next, rules))
    }

    /// Stop validating. Running tasks are cancelled and nothing more is
    /// emitted until the next activation.
    pub fn deactivate(&mut self) {
        self.core.lock().deactivate("deactivated");
        log::debug!("Validator deactivated");
    }

    fn start(&self, record: Record, rules: Vec<usize>) -> PassHandle {
        let record_id = record.id();
        let fields = BTreeMap::from([(record_id, self.core.rules.field_names(&rules))]);

        let pass = {
            let mut state = self.core.lock();
            let pass = state.next_pass();
            state.running.cancel_where(
                |task| task.record_id == record_id && rules.contains(&task.rule),
                "aborted by typing",
            );
            for &index in &rules {
                state.schedule(pass, (record_id, index));
            }
            pass
        };
        self.core.announce(pass, fields.clone());
        log::debug!(
            "Pass {pass} validating record {record_id} with {} rule(s)",
            rules.len()
        );

        let core = self.core.clone();
        let join = tokio::spawn(async move {
            let mut stopped = HashSet::new();
            let output = run_chain(&core, pass, &record, &rules, &mut stopped).await?;
            core.finish(pass, output.collected, fields);
            Ok(())
        });
        PassHandle::new(pass, join)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.core.rules.len())
            .field("record", &self.record.as_ref().map(Record::id))
            .field("enabled", &self.enabled)
            .finish()
    }
}
