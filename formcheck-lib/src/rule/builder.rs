//! Builder for rule declarations.

use std::future::Future;
use std::sync::Arc;

use super::{BulkRuleResult, Evaluate, Outcome, Rule, RuleResult};
use crate::error::SetupError;
use crate::model::Record;
use crate::report::{BulkResult, RawResult};

/// Builder for a single [`Rule`].
///
/// Missing or malformed properties are reported by [`RuleBuilder::build`].
pub struct RuleBuilder {
    name: String,
    field: String,
    target_fields: Vec<String>,
    stop_on_error: bool,
    skip_if_fields_failed: Vec<String>,
    evaluate: Option<Evaluate>,
}

impl RuleBuilder {
    pub(crate) fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            target_fields: Vec::new(),
            stop_on_error: false,
            skip_if_fields_failed: Vec::new(),
            evaluate: None,
        }
    }

    /// Record fields the rule reads. A change to any of them re-runs it.
    pub fn targets<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Skip later rules for the same field when this one errors.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Skip this rule when any of `fields` already failed in the pass.
    pub fn skip_if_failed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_if_fields_failed = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Evaluate with a function returning a ready or pending outcome.
    pub fn evaluate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> Outcome<RuleResult> + Send + Sync + 'static,
    {
        self.evaluate = Some(Evaluate::Record(Arc::new(f)));
        self
    }

    /// Evaluate synchronously. `None` means valid.
    pub fn check<F>(self, f: F) -> Self
    where
        F: Fn(&Record) -> Option<RawResult> + Send + Sync + 'static,
    {
        self.evaluate(move |record| Outcome::Ready(Ok(f(record))))
    }

    /// Evaluate asynchronously on an owned copy of the record.
    pub fn check_async<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RuleResult> + Send + 'static,
    {
        self.evaluate(move |record| Outcome::pending(f(record.clone())))
    }

    /// Evaluate once per batch with a function returning a ready or pending
    /// outcome. Makes this a bulk rule.
    pub fn evaluate_bulk<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Record]) -> Outcome<BulkRuleResult> + Send + Sync + 'static,
    {
        self.evaluate = Some(Evaluate::Bulk(Arc::new(f)));
        self
    }

    /// Bulk rule evaluated synchronously.
    pub fn check_bulk<F>(self, f: F) -> Self
    where
        F: Fn(&[Record]) -> Vec<BulkResult> + Send + Sync + 'static,
    {
        self.evaluate_bulk(move |records| Outcome::Ready(Ok(f(records))))
    }

    /// Bulk rule evaluated asynchronously on owned copies of the batch.
    pub fn check_bulk_async<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Vec<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BulkRuleResult> + Send + 'static,
    {
        self.evaluate_bulk(move |records| Outcome::pending(f(records.to_vec())))
    }

    /// Validate the declaration and build the rule.
    pub fn build(self) -> Result<Rule, SetupError> {
        if self.name.trim().is_empty() {
            return Err(SetupError::MissingName);
        }
        if self.field.trim().is_empty() {
            return Err(SetupError::MissingField { rule: self.name });
        }
        if self.target_fields.is_empty() {
            return Err(SetupError::MissingTargets {
                rule: self.name,
                field: self.field,
            });
        }
        if let Some(index) = self.target_fields.iter().position(|t| t.trim().is_empty()) {
            return Err(SetupError::InvalidTarget {
                rule: self.name,
                field: self.field,
                index,
            });
        }
        let Some(evaluate) = self.evaluate else {
            return Err(SetupError::MissingEvaluate {
                rule: self.name,
                field: self.field,
            });
        };

        Ok(Rule {
            name: self.name,
            field: self.field,
            target_fields: self.target_fields,
            stop_on_error: self.stop_on_error,
            skip_if_fields_failed: self.skip_if_fields_failed,
            evaluate,
        })
    }
}
