//! Rule set configuration errors

/// Error raised while declaring rules or constructing an engine.
///
/// These are programmer errors. They are reported when the engine is
/// built, never while it runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// The engine was given an empty rule list.
    #[error("No rules defined, specify at least 1")]
    NoRules,

    /// A rule was declared with an empty name.
    #[error("Rule must have a non-empty name")]
    MissingName,

    /// A rule was declared without the field its reports are keyed by.
    #[error("Rule '{rule}' must have a non-empty field name")]
    MissingField { rule: String },

    /// A rule does not declare which record fields it reads.
    #[error("Rule '{rule}' on '{field}' must declare at least one target field")]
    MissingTargets { rule: String, field: String },

    /// A target field name is empty.
    #[error("Rule '{rule}' on '{field}' has an invalid target field at index {index}")]
    InvalidTarget {
        rule: String,
        field: String,
        index: usize,
    },

    /// A rule has no evaluation function.
    #[error("Rule '{rule}' on '{field}' has no evaluate function")]
    MissingEvaluate { rule: String, field: String },

    /// The same rule was declared twice for the same field.
    #[error("Cannot have same rule pairs '{rule}-{field}'")]
    Duplicate { rule: String, field: String },

    /// A cross-record rule was given to the single-record engine.
    #[error("Rule '{rule}' on '{field}' is a bulk rule and needs the bulk engine")]
    BulkRuleNotSupported { rule: String, field: String },
}
