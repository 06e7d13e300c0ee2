//! Ordered evaluation of per-record rules.

use std::collections::HashSet;

use super::PassId;
use super::state::{Collected, EngineCore};
use super::running::RunningTask;
use crate::error::{EngineError, RuleError};
use crate::model::{Record, RecordId};
use crate::report::{RawReport, RawResult};
use crate::rule::{Outcome, Rule};
use crate::task::Cancellable;

/// What a chain run produced for one record.
#[derive(Debug, Default)]
pub(crate) struct ChainOutput {
    pub collected: Vec<Collected>,
    /// Bulk rules met in the chain, left for the bulk phase.
    pub deferred: Vec<usize>,
}

/// Returns true if `rule` must be skipped given the fields in `stopped`.
pub(crate) fn is_skipped(rule: &Rule, stopped: &HashSet<String>) -> bool {
    stopped.contains(rule.field())
        || rule
            .skip_if_fields_failed()
            .iter()
            .any(|f| stopped.contains(f))
}

/// Turn a rule's result into a raw result, or the pass's fatal error.
pub(crate) fn classify(
    rule: &Rule,
    record_id: Option<RecordId>,
    result: Result<Option<RawResult>, RuleError>,
) -> Result<Option<RawResult>, EngineError> {
    match result {
        Ok(raw) => Ok(raw),
        Err(RuleError::Failed { message, .. }) => Ok(Some(RawResult::errors([message]))),
        Err(RuleError::Internal(source)) => Err(EngineError::rule(
            rule.name(),
            rule.field(),
            record_id,
            source,
        )),
    }
}

/// Evaluate `rules` against `record` in order.
///
/// Async rules are awaited one at a time and registered as running so a
/// later change can cancel them. A rule whose field (or one of its
/// `skip_if_fields_failed`) is in `stopped` is skipped; an erroring
/// `stop_on_error` rule adds its field to `stopped`.
pub(crate) async fn run_chain(
    core: &EngineCore,
    pass: PassId,
    record: &Record,
    rules: &[usize],
    stopped: &mut HashSet<String>,
) -> Result<ChainOutput, EngineError> {
    let record_id = record.id();
    let mut output = ChainOutput::default();

    for &index in rules {
        let rule = core.rules.get(index);
        let Some(evaluate) = rule.record_fn() else {
            output.deferred.push(index);
            continue;
        };

        if is_skipped(rule, stopped) {
            log::trace!(
                "Skipping \"{}\" on {} for record {record_id}",
                rule.name(),
                rule.field()
            );
            continue;
        }

        let key = (record_id, index);
        if !core.is_current(pass, key) {
            log::trace!(
                "\"{}\" for record {record_id} superseded before pass {pass} reached it",
                rule.name()
            );
            continue;
        }

        let result = match evaluate(record) {
            Outcome::Ready(result) => result,
            Outcome::Pending(future) => {
                let name = rule.name().to_string();
                let task = Cancellable::new(future, move || {
                    log::debug!("Async validation \"{name}\" on record {record_id} aborted!");
                });
                core.register(RunningTask {
                    record_id,
                    rule: index,
                    pass,
                    handle: task.handle(),
                });

                let awaited = task.await;
                core.unregister(pass, key);

                match awaited {
                    Ok(result) => {
                        log::debug!(
                            "Async validation \"{}\" on record {record_id} DONE",
                            rule.name()
                        );
                        result
                    }
                    Err(_) => continue,
                }
            }
        };

        let raw = classify(rule, Some(record_id), result)?;
        if rule.stop_on_error() && raw.as_ref().is_some_and(RawResult::has_errors) {
            stopped.insert(rule.field().to_string());
        }

        output.collected.push(Collected {
            key,
            raw: RawReport::new(
                record_id,
                rule.name(),
                rule.field(),
                rule.target_fields().to_vec(),
                raw,
            ),
        });
    }

    Ok(output)
}
