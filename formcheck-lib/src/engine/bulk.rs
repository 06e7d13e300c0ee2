use std::collections::{BTreeMap, HashMap, HashSet};

use super::chain::{is_skipped, run_chain};
use super::state::{Collected, EngineCore};
use super::reconcile::reconcile;
use super::running::RunningBulkTask;
use super::{EventSender, FieldsByRecord, PassHandle, PassId};
use crate::error::{EngineError, RuleError, SetupError};
use crate::model::{Record, RecordId};
use crate::report::{BulkPayload, BulkResult, RawReport, RawResult};
use crate::rule::{Outcome, Rule, RuleSet};
use crate::task::Cancellable;

/// Work scheduled for one record in a pass.
#[derive(Debug)]
struct PlanEntry {
    record: Record,
    rules: Vec<usize>,
    /// Record fields entering the validating state.
    fields: Vec<String>,
}

impl PlanEntry {
    fn add(&mut self, rule: usize, fields: impl IntoIterator<Item = String>) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        for field in fields {
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
    }
}

/// Validation engine for a collection of records.
///
/// Per-record rules run as in [`super::Validator`]. Bulk rules run once per
/// pass over every record scheduled for them, after all per-record rules,
/// so that their results arrive in a second `Done` batch.
pub struct BulkValidator {
    core: EngineCore,
    /// Records as of the last scheduled pass, the base of the next diff.
    validated: Vec<Record>,
    enabled: bool,
}

impl BulkValidator {
    /// Create an engine that sends its notifications to `events`.
    pub fn new(rules: Vec<Rule>, events: EventSender) -> Result<Self, SetupError> {
        Ok(Self {
            core: EngineCore::new(RuleSet::new(rules)?, events),
            validated: Vec::new(),
            enabled: true,
        })
    }

    /// Turn validation on or off.
    ///
    /// While off, the collection is tracked for presence only; running
    /// tasks keep going and their results are filtered on emission.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rules(&self) -> &RuleSet {
        &self.core.rules
    }

    /// Number of async evaluations in flight.
    pub fn running_tasks(&self) -> usize {
        self.core.running_tasks()
    }

    /// Start validating `records`. Every record is treated as added.
    pub fn activate(&mut self, records: Vec<Record>) -> Option<PassHandle> {
        self.core.lock().active = true;
        self.validated.clear();
        self.on_records_changed(records)
    }

    /// Stop validating. Running tasks are cancelled and nothing more is
    /// emitted until the next activation.
    pub fn deactivate(&mut self) {
        self.core.lock().deactivate("deactivated");
        self.validated.clear();
        log::debug!("Bulk validator deactivated");
    }

    /// Reconcile `next` against the last validated collection and validate
    /// what changed.
    ///
    /// Returns `None` when nothing needs to run.
    pub fn on_records_changed(&mut self, next: Vec<Record>) -> Option<PassHandle> {
        let rules = self.core.rules.clone();
        let mut state = self.core.lock();
        state.present = next.iter().map(Record::id).collect();

        if !self.enabled {
            return None;
        }

        let diff = reconcile(&self.validated, &next);
        if diff.is_empty() {
            return None;
        }

        for id in &diff.removed {
            state.forget(*id);
        }
        state.running.cancel_where(
            |task| diff.touches(task.record_id, |f| rules.get(task.rule).targets_any(f)),
            "aborted by typing",
        );
        let interrupted = state.running.cancel_bulk_where(
            |task| {
                let rule = rules.get(task.rule);
                task.record_ids
                    .iter()
                    .any(|id| diff.touches(*id, |f| rule.targets_any(f)))
            },
            "aborted by typing",
        );

        // Surviving members of an interrupted batch keep their bulk check
        let mut resumed: HashMap<RecordId, Vec<usize>> = HashMap::new();
        for task in &interrupted {
            for id in &task.record_ids {
                if state.present.contains(id) {
                    resumed.entry(*id).or_default().push(task.rule);
                }
            }
        }

        let mut plan: Vec<PlanEntry> = Vec::new();
        for record in &next {
            let id = record.id();
            let mut entry = PlanEntry {
                record: record.clone(),
                rules: Vec::new(),
                fields: Vec::new(),
            };

            let changed: Vec<String> = if diff.added.contains(&id) {
                record.field_names().map(String::from).collect()
            } else {
                diff.changed.get(&id).cloned().unwrap_or_default()
            };
            for (index, rule) in rules.iter() {
                let matched: Vec<String> = rule
                    .target_fields()
                    .iter()
                    .filter(|t| changed.contains(*t))
                    .cloned()
                    .collect();
                if !matched.is_empty() {
                    entry.add(index, matched);
                }
            }
            for &index in resumed.get(&id).into_iter().flatten() {
                entry.add(index, rules.get(index).target_fields().to_vec());
            }

            if !entry.rules.is_empty() {
                entry.rules.sort_unstable();
                plan.push(entry);
            }
        }

        drop(state);
        self.validated = next;
        if plan.is_empty() {
            return None;
        }
        Some(self.start(plan))
    }

    fn start(&self, plan: Vec<PlanEntry>) -> PassHandle {
        let pass = {
            let mut state = self.core.lock();
            let pass = state.next_pass();
            for entry in &plan {
                for &index in &entry.rules {
                    state.schedule(pass, (entry.record.id(), index));
                }
            }
            pass
        };

        let fields: FieldsByRecord = plan
            .iter()
            .map(|e| (e.record.id(), e.fields.clone()))
            .collect();
        self.core.announce(pass, fields);
        log::debug!("Pass {pass} validating {} record(s)", plan.len());

        let core = self.core.clone();
        let join = tokio::spawn(run_pass(core, pass, plan));
        PassHandle::new(pass, join)
    }
}

/// Per-record phase, then bulk phase.
async fn run_pass(
    core: EngineCore,
    pass: PassId,
    plan: Vec<PlanEntry>,
) -> Result<(), EngineError> {
    let mut collected = Vec::new();
    let mut stopped: HashMap<RecordId, HashSet<String>> = HashMap::new();
    let mut batches: BTreeMap<usize, Vec<RecordId>> = BTreeMap::new();

    for entry in &plan {
        let record_id = entry.record.id();
        let record_stopped = stopped.entry(record_id).or_default();
        let output = run_chain(&core, pass, &entry.record, &entry.rules, record_stopped).await?;
        collected.extend(output.collected);
        for index in output.deferred {
            batches.entry(index).or_default().push(record_id);
        }
    }

    let announced: FieldsByRecord = plan
        .iter()
        .map(|e| (e.record.id(), e.fields.clone()))
        .collect();

    let pending = pending_bulk_fields(&core.rules, &plan, &batches, &stopped);
    let settled = announced
        .into_iter()
        .map(|(id, fields)| {
            let still = pending.get(&id);
            let done: Vec<String> = fields
                .into_iter()
                .filter(|f| !still.is_some_and(|p| p.contains(f)))
                .collect();
            (id, done)
        })
        .filter(|(_, fields)| !fields.is_empty())
        .collect();
    core.finish(pass, collected, settled);

    if batches.is_empty() {
        return Ok(());
    }
    core.announce(pass, pending.clone());

    let records: HashMap<RecordId, &Record> =
        plan.iter().map(|e| (e.record.id(), &e.record)).collect();
    let mut bulk_stopped: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();

    for (index, candidates) in batches {
        let rule = core.rules.get(index);
        let batch: Vec<Record> = candidates
            .iter()
            .filter(|id| core.is_current(pass, (**id, index)))
            .filter_map(|id| records.get(id).map(|r| (*r).clone()))
            .collect();
        if batch.is_empty() {
            continue;
        }

        let blocked = is_skipped(rule, &bulk_stopped)
            || batch
                .iter()
                .any(|r| stopped.get(&r.id()).is_some_and(|s| is_skipped(rule, s)));
        if blocked {
            log::trace!("Skipping bulk \"{}\" for pass {pass}", rule.name());
            continue;
        }

        let Some(results) = evaluate_bulk(&core, pass, index, rule, &batch).await? else {
            continue;
        };
        collect_bulk(rule, index, &batch, results, &mut bulk_stopped, &mut collected);
    }

    core.finish(pass, collected, pending);
    Ok(())
}

/// Fields still waiting on a bulk rule after the per-record phase.
fn pending_bulk_fields(
    rules: &RuleSet,
    plan: &[PlanEntry],
    batches: &BTreeMap<usize, Vec<RecordId>>,
    stopped: &HashMap<RecordId, HashSet<String>>,
) -> FieldsByRecord {
    let mut pending = FieldsByRecord::new();
    for entry in plan {
        let id = entry.record.id();
        let fields: Vec<String> = entry
            .fields
            .iter()
            .filter(|field| {
                batches.iter().any(|(index, members)| {
                    let rule = rules.get(*index);
                    members.contains(&id)
                        && rule.targets(field)
                        && !stopped.get(&id).is_some_and(|s| is_skipped(rule, s))
                })
            })
            .cloned()
            .collect();
        if !fields.is_empty() {
            pending.insert(id, fields);
        }
    }
    pending
}

/// Evaluate a bulk rule, awaiting it as a registered task when async.
///
/// Returns `None` when the task was cancelled.
async fn evaluate_bulk(
    core: &EngineCore,
    pass: PassId,
    index: usize,
    rule: &Rule,
    batch: &[Record],
) -> Result<Option<Result<Vec<BulkResult>, RuleError>>, EngineError> {
    let Some(evaluate) = rule.bulk_fn() else {
        return Ok(None);
    };

    let result = match evaluate(batch) {
        Outcome::Ready(result) => result,
        Outcome::Pending(future) => {
            let name = rule.name().to_string();
            let task = Cancellable::new(future, move || {
                log::debug!("Async bulk validation \"{name}\" aborted!");
            });
            core.register_bulk(RunningBulkTask {
                rule: index,
                record_ids: batch.iter().map(Record::id).collect(),
                pass,
                handle: task.handle(),
            });

            let awaited = task.await;
            core.unregister_bulk(pass, index);

            match awaited {
                Ok(result) => {
                    log::debug!("Async bulk validation \"{}\" DONE", rule.name());
                    result
                }
                Err(_) => return Ok(None),
            }
        }
    };

    match result {
        Err(RuleError::Internal(source)) => Err(EngineError::rule(
            rule.name(),
            rule.field(),
            None,
            source,
        )),
        other => Ok(Some(other)),
    }
}

/// Turn bulk results into raw reports for the records of `batch`.
fn collect_bulk(
    rule: &Rule,
    index: usize,
    batch: &[Record],
    results: Result<Vec<BulkResult>, RuleError>,
    bulk_stopped: &mut HashSet<String>,
    collected: &mut Vec<Collected>,
) {
    let members: HashSet<RecordId> = batch.iter().map(Record::id).collect();
    let causes = rule.target_fields().to_vec();
    let mut push = |record_id: RecordId, field: &str, raw: Option<RawResult>| {
        if rule.stop_on_error() && raw.as_ref().is_some_and(RawResult::has_errors) {
            bulk_stopped.insert(field.to_string());
        }
        collected.push(Collected {
            key: (record_id, index),
            raw: RawReport::new(record_id, rule.name(), field, causes.clone(), raw),
        });
    };

    let results = match results {
        Ok(results) => results,
        Err(err) => {
            let message = err.to_string();
            for id in batch.iter().map(Record::id) {
                push(id, rule.field(), Some(RawResult::errors([message.clone()])));
            }
            return;
        }
    };

    for result in results {
        if !members.contains(&result.record_id) {
            log::trace!(
                "Bulk \"{}\" answered for record {} outside its batch",
                rule.name(),
                result.record_id
            );
            continue;
        }
        match result.payload {
            BulkPayload::Single(raw) => push(result.record_id, rule.field(), raw),
            BulkPayload::ByField(by_field) => {
                for (field, raw) in by_field {
                    push(result.record_id, &field, Some(raw));
                }
            }
        }
    }
}

impl std::fmt::Debug for BulkValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkValidator")
            .field("rules", &self.core.rules.len())
            .field("records", &self.validated.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}
