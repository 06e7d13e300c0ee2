//! Declarative validation rules.
//!
//! A [`Rule`] names the field its reports are keyed by, the record fields it
//! reads, and how it is evaluated. Rules are declared once, in order, and
//! handed to an engine as a list.
//!
//! # Example
//!
//! ```
//! use formcheck_lib::report::RawResult;
//! use formcheck_lib::rule::Rule;
//!
//! let rule = Rule::builder("IsRequired", "username")
//!     .targets(["username"])
//!     .stop_on_error(true)
//!     .check(|record| {
//!         record
//!             .value("username")
//!             .is_empty()
//!             .then(|| RawResult::errors(["Field is required"]))
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(rule.targets_any(&["username".to_string()]));
//! ```

mod builder;
mod outcome;
mod registry;

pub use builder::RuleBuilder;
pub use outcome::{BulkRuleResult, Outcome, RuleResult};
pub use registry::RuleSet;

use std::sync::Arc;

use crate::model::Record;

pub(crate) type RecordFn = dyn Fn(&Record) -> Outcome<RuleResult> + Send + Sync;
pub(crate) type BulkFn = dyn Fn(&[Record]) -> Outcome<BulkRuleResult> + Send + Sync;

/// How a rule is evaluated.
#[derive(Clone)]
pub(crate) enum Evaluate {
    /// Once per record.
    Record(Arc<RecordFn>),
    /// Once for every batch of records scheduled together.
    Bulk(Arc<BulkFn>),
}

/// A declared validation rule. Immutable once built.
#[derive(Clone)]
pub struct Rule {
    name: String,
    field: String,
    target_fields: Vec<String>,
    stop_on_error: bool,
    skip_if_fields_failed: Vec<String>,
    evaluate: Evaluate,
}

impl Rule {
    /// Start declaring a rule named `name` that reports under `field`.
    ///
    /// `field` may be virtual (e.g. `password` for a rule comparing
    /// `password1` and `password2`).
    pub fn builder(name: impl Into<String>, field: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name, field)
    }

    /// Rule name, e.g. `IsRequired`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field the rule's reports are keyed by.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Record fields whose change re-runs this rule.
    pub fn target_fields(&self) -> &[String] {
        &self.target_fields
    }

    /// Whether an error skips later rules for the same field in a pass.
    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    /// Fields that, once failed earlier in a pass, make this rule skip.
    pub fn skip_if_fields_failed(&self) -> &[String] {
        &self.skip_if_fields_failed
    }

    /// Whether the rule runs once across many records.
    pub fn is_bulk(&self) -> bool {
        matches!(self.evaluate, Evaluate::Bulk(_))
    }

    /// Returns true if any of `fields` is a target of this rule.
    pub fn targets_any(&self, fields: &[String]) -> bool {
        fields.iter().any(|f| self.targets(f))
    }

    /// Returns true if `field` is a target of this rule.
    pub fn targets(&self, field: &str) -> bool {
        self.target_fields.iter().any(|t| t == field)
    }

    pub(crate) fn record_fn(&self) -> Option<&RecordFn> {
        match &self.evaluate {
            Evaluate::Record(f) => Some(f.as_ref()),
            Evaluate::Bulk(_) => None,
        }
    }

    pub(crate) fn bulk_fn(&self) -> Option<&BulkFn> {
        match &self.evaluate {
            Evaluate::Bulk(f) => Some(f.as_ref()),
            Evaluate::Record(_) => None,
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("target_fields", &self.target_fields)
            .field("stop_on_error", &self.stop_on_error)
            .field("skip_if_fields_failed", &self.skip_if_fields_failed)
            .field("is_bulk", &self.is_bulk())
            .finish_non_exhaustive()
    }
}
