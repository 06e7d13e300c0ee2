//! Errors that end a validation pass

use super::BoxError;
use crate::model::RecordId;

/// Fatal error of a validation pass, returned through its `PassHandle`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A rule failed with an unclassified error.
    #[error("rule '{rule}' on '{field}' failed{}: {source}", record_suffix(.record_id))]
    Rule {
        rule: String,
        field: String,
        record_id: Option<RecordId>,
        #[source]
        source: BoxError,
    },

    /// The task running the pass panicked or was aborted.
    #[error("validation pass aborted: {0}")]
    Aborted(String),
}

impl EngineError {
    /// Creates a rule error.
    pub fn rule(
        rule: impl Into<String>,
        field: impl Into<String>,
        record_id: Option<RecordId>,
        source: BoxError,
    ) -> Self {
        Self::Rule {
            rule: rule.into(),
            field: field.into(),
            record_id,
            source,
        }
    }
}

fn record_suffix(record_id: &Option<RecordId>) -> String {
    match record_id {
        Some(id) => format!(" on record {id}"),
        None => String::new(),
    }
}
