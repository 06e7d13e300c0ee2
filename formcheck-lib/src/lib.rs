//! Form validation orchestration engine
//!
//! Runs declarative validation rules against one record or a collection of
//! records, re-running only what a change affects, cancelling stale async
//! work, and consolidating rule outputs into flat reports a UI can render.

pub mod collection;
pub mod engine;
pub mod error;
pub mod field_state;
pub mod model;
pub mod report;
pub mod rule;
pub mod settings;
pub mod submit;
pub mod task;
pub mod validators;
pub mod visibility;

pub use collection::{Statistics, SubmitOutcome, ValidatedCollection};
pub use engine::{BulkValidator, PassHandle, PassId, ValidationEvent, Validator};
pub use model::{Record, RecordId, Value};
pub use report::{BulkResult, RawResult, Report, Severity};
pub use rule::{Outcome, Rule, RuleBuilder};
