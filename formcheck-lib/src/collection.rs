//! Host-side state for a validated record collection.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{self, BulkValidator, EventReceiver, PassHandle, PassId, ValidationEvent};
use crate::error::{EngineError, SetupError, SubmitError};
use crate::field_state::{FieldState, FieldStatePatch, FieldStates};
use crate::model::{Record, RecordId, Value};
use crate::report::{Report, merge_reports};
use crate::rule::Rule;
use crate::submit::{SubmitBackend, SubmitResponse};
use crate::visibility::{FieldWatch, is_visible, visible_reports};

/// Summary of the stored reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub errors_count: usize,
    pub warnings_count: usize,
    pub any_record_invalid: bool,
    /// Some error or warning is visible to the user.
    pub any_field_with_visible_report_dirty: bool,
}

/// What [`ValidatedCollection::submit`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A record is invalid; all fields were touched and nothing was sent.
    Blocked,
    /// The backend accepted the records.
    Accepted(serde_json::Value),
    /// The backend found problems; they replaced the affected records'
    /// reports.
    Rejected { problems: usize },
}

/// A record collection with its validation state.
///
/// Owns a [`BulkValidator`] and applies its events to per-record reports
/// and validating fields. Also keeps per-field interaction state, which the
/// engine never touches.
pub struct ValidatedCollection {
    engine: BulkValidator,
    events: EventReceiver,
    activated: bool,
    records: Vec<Record>,
    reports: BTreeMap<RecordId, Vec<Report>>,
    validating: BTreeMap<RecordId, BTreeMap<String, PassId>>,
    field_states: BTreeMap<RecordId, FieldStates>,
    passes: Vec<PassHandle>,
    /// First error of a pass reaped before `settle` saw it.
    failed: Option<EngineError>,
}

impl ValidatedCollection {
    /// Create an empty collection validated by `rules`.
    pub fn new(rules: Vec<Rule>) -> Result<Self, SetupError> {
        let (sender, events) = engine::channel();
        Ok(Self {
            engine: BulkValidator::new(rules, sender)?,
            events,
            activated: false,
            records: Vec::new(),
            reports: BTreeMap::new(),
            validating: BTreeMap::new(),
            field_states: BTreeMap::new(),
            passes: Vec::new(),
            failed: None,
        })
    }

    /// Turn validation on or off. Changes made while off are validated on
    /// the next change after turning it back on.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.engine.set_enabled(enabled);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Replace the collection and validate what changed.
    pub fn set_records(&mut self, next: Vec<Record>) {
        self.reports.retain(|id, _| next.iter().any(|r| r.id() == *id));
        self.validating.retain(|id, _| next.iter().any(|r| r.id() == *id));
        self.field_states.retain(|id, _| next.iter().any(|r| r.id() == *id));

        for record in &next {
            self.reports.entry(record.id()).or_default();
            let states = self.field_states.entry(record.id()).or_default();
            for field in record.field_names() {
                states.entry(field.to_string()).or_default();
            }
        }

        self.records = next.clone();
        let pass = if self.activated {
            self.engine.on_records_changed(next)
        } else {
            self.activated = true;
            self.engine.activate(next)
        };
        self.reap_passes();
        self.passes.extend(pass);
        self.drain_events();
    }

    /// Drop handles of finished passes, keeping the first error for
    /// [`ValidatedCollection::settle`].
    fn reap_passes(&mut self) {
        let mut reaped = 0;
        for mut pass in std::mem::take(&mut self.passes) {
            match pass.try_wait() {
                None => self.passes.push(pass),
                Some(result) => {
                    reaped += 1;
                    if let Err(err) = result {
                        log::warn!("Validation pass {} failed: {err}", pass.id());
                        self.failed.get_or_insert(err);
                    }
                }
            }
        }
        if reaped > 0 {
            log::trace!("Reaped {reaped} finished pass(es), {} pending", self.passes.len());
        }
    }

    /// Number of passes started and not yet reaped.
    pub fn pending_passes(&self) -> usize {
        self.passes.len()
    }

    /// Append a record.
    pub fn add_record(&mut self, record: Record) {
        let mut next = self.records.clone();
        next.push(record);
        self.set_records(next);
    }

    /// Remove a record. Returns false if it was not there.
    pub fn remove_record(&mut self, id: RecordId) -> bool {
        if self.record(id).is_none() {
            return false;
        }
        let next = self.records.iter().filter(|r| r.id() != id).cloned().collect();
        self.set_records(next);
        true
    }

    /// Set one field of one record. Returns false for an unknown record.
    pub fn update_field(
        &mut self,
        id: RecordId,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> bool {
        let mut next = self.records.clone();
        let Some(record) = next.iter_mut().find(|r| r.id() == id) else {
            return false;
        };
        record.insert(field, value);
        self.set_records(next);
        true
    }

    /// Apply an engine event to the stored state.
    pub fn apply(&mut self, event: ValidationEvent) {
        match event {
            ValidationEvent::Started { pass, fields } => {
                for (id, fields) in fields {
                    if !self.field_states.contains_key(&id) {
                        continue;
                    }
                    let validating = self.validating.entry(id).or_default();
                    for field in fields {
                        validating.insert(field, pass);
                    }
                }
            }
            ValidationEvent::Done {
                pass,
                reports,
                settled,
            } => {
                for (id, fields) in settled {
                    if let Some(validating) = self.validating.get_mut(&id) {
                        for field in fields {
                            if validating.get(&field) == Some(&pass) {
                                validating.remove(&field);
                            }
                        }
                    }
                }

                let mut by_record: BTreeMap<RecordId, Vec<Report>> = BTreeMap::new();
                for report in reports {
                    by_record.entry(report.record_id).or_default().push(report);
                }
                for (id, batch) in by_record {
                    match self.reports.get_mut(&id) {
                        Some(stored) => merge_reports(stored, &batch),
                        None => log::trace!("Ignoring reports for unknown record {id}"),
                    }
                }
            }
        }
    }

    /// Apply every event already received. Returns how many there were.
    pub fn drain_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            count += 1;
        }
        count
    }

    /// Wait for the next event, apply it and return it.
    pub async fn next_event(&mut self) -> Option<ValidationEvent> {
        let event = self.events.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Wait for every pass started so far and apply their events.
    ///
    /// Returns the first fatal pass error, after waiting for the rest.
    pub async fn settle(&mut self) -> Result<(), EngineError> {
        let mut first_error = self.failed.take();
        while !self.passes.is_empty() {
            for pass in std::mem::take(&mut self.passes) {
                if let Err(err) = pass.wait().await {
                    log::warn!("Validation pass failed: {err}");
                    first_error.get_or_insert(err);
                }
            }
            self.drain_events();
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Update the interaction state of one field.
    pub fn set_field_state(&mut self, id: RecordId, field: &str, patch: FieldStatePatch) {
        if let Some(states) = self.field_states.get_mut(&id) {
            states.entry(field.to_string()).or_default().apply(patch);
        }
    }

    /// The user edited `field`.
    pub fn mark_dirty(&mut self, id: RecordId, field: &str) {
        self.set_field_state(id, field, FieldStatePatch::dirty());
    }

    /// `field` lost focus.
    pub fn mark_focused(&mut self, id: RecordId, field: &str) {
        self.set_field_state(id, field, FieldStatePatch::focused());
    }

    /// Mark every known field of every record dirty and focused, making all
    /// reports visible.
    pub fn touch_all_field_states(&mut self) {
        for states in self.field_states.values_mut() {
            for state in states.values_mut() {
                *state = FieldState::TOUCHED;
            }
        }
    }

    /// Mark `fields` of one record (all of its known fields for `None`)
    /// dirty and focused.
    pub fn touch_field_states(&mut self, id: RecordId, fields: Option<&[&str]>) {
        let Some(states) = self.field_states.get_mut(&id) else {
            return;
        };
        match fields {
            Some(fields) => {
                for field in fields {
                    states.insert(field.to_string(), FieldState::TOUCHED);
                }
            }
            None => {
                for state in states.values_mut() {
                    *state = FieldState::TOUCHED;
                }
            }
        }
    }

    /// Replace the reports of every record named in `reports` wholesale.
    pub fn override_reports(&mut self, reports: Vec<Report>) {
        let mut by_record: BTreeMap<RecordId, Vec<Report>> = BTreeMap::new();
        for report in reports {
            by_record.entry(report.record_id).or_default().push(report);
        }
        for (id, reports) in by_record {
            if let Some(stored) = self.reports.get_mut(&id) {
                *stored = reports;
            }
        }
    }

    /// Stored reports of a record.
    pub fn reports(&self, id: RecordId) -> &[Report] {
        self.reports.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields of a record being validated.
    pub fn validating_fields(&self, id: RecordId) -> Vec<&str> {
        self.validating
            .get(&id)
            .map(|fields| fields.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn field_states(&self, id: RecordId) -> Option<&FieldStates> {
        self.field_states.get(&id)
    }

    /// Returns true if any field of any record is being validated.
    pub fn is_validating(&self) -> bool {
        self.validating.values().any(|fields| !fields.is_empty())
    }

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        let empty = FieldStates::new();

        for (id, reports) in &self.reports {
            let states = self.field_states.get(id).unwrap_or(&empty);
            for report in reports {
                if report.is_error() {
                    stats.errors_count += 1;
                } else if report.is_warning() {
                    stats.warnings_count += 1;
                } else {
                    continue;
                }
                if is_visible(&report.caused_by_fields, states, report) {
                    stats.any_field_with_visible_report_dirty = true;
                }
            }
        }
        stats.any_record_invalid = stats.errors_count > 0;
        stats
    }

    /// Reports of one field the user should see.
    pub fn visible_reports(&self, id: RecordId, watch: &FieldWatch) -> Vec<&Report> {
        let empty = FieldStates::new();
        let states = self.field_states.get(&id).unwrap_or(&empty);
        visible_reports(watch, states, self.reports(id))
    }

    /// Returns true if submitting makes sense now: there are records,
    /// nothing is validating and no report is showing.
    pub fn can_submit(&self) -> bool {
        !self.records.is_empty()
            && !self.is_validating()
            && !self.statistics().any_field_with_visible_report_dirty
    }

    /// Submit the records to `backend`.
    ///
    /// With an invalid record, every field is touched instead so hidden
    /// errors become visible, and the backend is not called.
    pub async fn submit<B>(&mut self, backend: &B) -> Result<SubmitOutcome, SubmitError>
    where
        B: SubmitBackend + ?Sized,
    {
        if self.statistics().any_record_invalid {
            self.touch_all_field_states();
            return Ok(SubmitOutcome::Blocked);
        }

        let reply = backend.submit(&self.records).await?;
        match reply.interpret()? {
            SubmitResponse::Accepted(data) => {
                log::info!("Submitted {} record(s)", self.records.len());
                Ok(SubmitOutcome::Accepted(data))
            }
            SubmitResponse::Rejected(reports) => {
                let problems = reports.len();
                log::info!("Submission rejected with {problems} problem(s)");
                self.override_reports(reports);
                Ok(SubmitOutcome::Rejected { problems })
            }
        }
    }
}

impl std::fmt::Debug for ValidatedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedCollection")
            .field("engine", &self.engine)
            .field("records", &self.records.len())
            .field("pending_passes", &self.passes.len())
            .finish_non_exhaustive()
    }
}
