//! Errors returned by rule evaluation

use super::BoxError;

/// Error produced by a rule's evaluate function.
///
/// `Failed` is an expected outcome, such as an upstream check answering
/// with a status code. The engine turns it into an error report for the
/// rule's field. `Internal` is a bug in the rule and aborts the pass.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Recognizable failure, reported to the user.
    #[error("{message}")]
    Failed { code: Option<u16>, message: String },

    /// Unclassified failure, propagated to the host.
    #[error("internal rule error: {0}")]
    Internal(#[source] BoxError),
}

impl RuleError {
    /// Creates a recognizable failure without a code.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            code: None,
            message: message.into(),
        }
    }

    /// Creates a recognizable failure with a status code.
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Failed {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Wraps an unclassified error.
    pub fn internal(err: impl Into<BoxError>) -> Self {
        Self::Internal(err.into())
    }

    /// Returns true if the engine converts this error into a report.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the status code of a recognizable failure.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Failed { code, .. } => *code,
            Self::Internal(_) => None,
        }
    }
}
