use super::{RawResult, Report, Severity};
use crate::model::RecordId;

/// A rule's raw result tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport {
    pub record_id: RecordId,
    pub rule_name: String,
    pub field_name: String,
    pub caused_by_fields: Vec<String>,
    /// `None` means the rule passed with nothing to add.
    pub result: Option<RawResult>,
}

impl RawReport {
    /// Tag `result` with its origin.
    pub fn new(
        record_id: RecordId,
        rule_name: impl Into<String>,
        field_name: impl Into<String>,
        caused_by_fields: Vec<String>,
        result: Option<RawResult>,
    ) -> Self {
        Self {
            record_id,
            rule_name: rule_name.into(),
            field_name: field_name.into(),
            caused_by_fields,
            result,
        }
    }

    fn report(&self, severity: Severity, message: Option<String>) -> Report {
        Report {
            record_id: self.record_id,
            rule_name: self.rule_name.clone(),
            field_name: self.field_name.clone(),
            severity,
            message,
            data: self.result.as_ref().and_then(|r| r.data.clone()),
            caused_by_fields: self.caused_by_fields.clone(),
        }
    }
}

/// Flatten raw results into reports.
///
/// Every error message becomes an `Error` report, every warning a `Warning`
/// report, and a result with neither becomes exactly one `Valid` report.
/// The output lists all errors, then all warnings, then all valid reports,
/// each group in input order.
pub fn consolidate<I>(raw: I) -> Vec<Report>
where
    I: IntoIterator<Item = RawReport>,
{
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut valid = Vec::new();

    for item in raw {
        let (error_messages, warning_messages) = match &item.result {
            Some(result) => (result.errors.as_slice(), result.warnings.as_slice()),
            None => (&[][..], &[][..]),
        };

        for message in error_messages {
            errors.push(item.report(Severity::Error, Some(message.clone())));
        }
        for message in warning_messages {
            warnings.push(item.report(Severity::Warning, Some(message.clone())));
        }
        if error_messages.is_empty() && warning_messages.is_empty() {
            valid.push(item.report(Severity::Valid, None));
        }
    }

    errors.extend(warnings);
    errors.extend(valid);
    errors
}
