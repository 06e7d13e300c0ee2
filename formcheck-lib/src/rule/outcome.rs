use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::RuleError;
use crate::report::{BulkResult, RawResult};

/// Result of evaluating a per-record rule. `Ok(None)` means valid.
pub type RuleResult = Result<Option<RawResult>, RuleError>;

/// Result of evaluating a bulk rule, one entry per record of the batch.
pub type BulkRuleResult = Result<Vec<BulkResult>, RuleError>;

/// A rule's answer: available now, or after awaiting.
pub enum Outcome<T> {
    /// Synchronous result.
    Ready(T),
    /// Asynchronous result. The engine can cancel it.
    Pending(BoxFuture<'static, T>),
}

impl<T> Outcome<T> {
    /// Wrap a future as a pending outcome.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl From<Option<RawResult>> for Outcome<RuleResult> {
    fn from(result: Option<RawResult>) -> Self {
        Self::Ready(Ok(result))
    }
}

impl From<RawResult> for Outcome<RuleResult> {
    fn from(result: RawResult) -> Self {
        Self::Ready(Ok(Some(result)))
    }
}

impl std::fmt::Debug for Outcome<RuleResult> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}
