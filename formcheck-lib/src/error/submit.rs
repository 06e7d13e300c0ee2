//! Submission errors

/// Error returned by a submit backend or while reading its reply.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The reply has a status the session does not understand.
    #[error("unexpected submit status {status}")]
    UnexpectedStatus { status: u16 },

    /// A validation-problems reply could not be parsed.
    #[error("malformed validation problems: {0}")]
    MalformedProblems(#[from] serde_json::Error),

    /// The backend could not deliver the records.
    #[error("transport error: {0}")]
    Transport(String),
}
