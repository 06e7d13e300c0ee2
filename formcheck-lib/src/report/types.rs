use serde::Deserialize;
use serde::Serialize;

use crate::model::RecordId;

/// Severity of a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The rule failed.
    Error,
    /// The rule passed with a remark.
    Warning,
    /// The rule passed.
    Valid,
}

/// One consolidated validation outcome.
///
/// A rule that yields two error messages produces two reports. A rule that
/// yields nothing produces one `Valid` report, which clears earlier failures
/// for its field and can carry derived `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub record_id: RecordId,
    pub rule_name: String,
    pub field_name: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Every field whose change can invalidate this report.
    #[serde(default)]
    pub caused_by_fields: Vec<String>,
}

impl Report {
    /// Creates an error report, e.g. for problems returned by a server.
    pub fn error(
        record_id: RecordId,
        rule_name: impl Into<String>,
        field_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            record_id,
            rule_name: rule_name.into(),
            caused_by_fields: vec![field_name.clone()],
            field_name,
            severity: Severity::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn is_valid(&self) -> bool {
        self.severity == Severity::Valid
    }

    /// Returns true if a change to `field` can invalidate this report.
    pub fn is_caused_by(&self, field: &str) -> bool {
        self.caused_by_fields.iter().any(|f| f == field)
    }
}

/// Raw output of one rule evaluation.
///
/// Empty `errors` and `warnings` mean the rule passed. Rules that have
/// nothing to say return `None` instead of an empty result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub data: Option<serde_json::Value>,
}

impl RawResult {
    /// A failing result with the given messages.
    pub fn errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            errors: messages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A passing result with warnings.
    pub fn warnings<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            warnings: messages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A passing result carrying derived data.
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Attach data to this result.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BulkPayload {
    Single(Option<RawResult>),
    ByField(Vec<(String, RawResult)>),
}

/// Result of a bulk rule for one record of its batch.
///
/// A bulk rule reports under its own field name by default. It can instead
/// report on named record fields with [`BulkResult::by_field`], e.g. a spell
/// check that flags `fullName`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResult {
    pub record_id: RecordId,
    pub(crate) payload: BulkPayload,
}

impl BulkResult {
    /// The record passed.
    pub fn valid(record_id: impl Into<RecordId>) -> Self {
        Self {
            record_id: record_id.into(),
            payload: BulkPayload::Single(None),
        }
    }

    /// One result under the rule's field.
    pub fn new(record_id: impl Into<RecordId>, result: RawResult) -> Self {
        Self {
            record_id: record_id.into(),
            payload: BulkPayload::Single(Some(result)),
        }
    }

    /// One result per named record field.
    pub fn by_field<I, S>(record_id: impl Into<RecordId>, results: I) -> Self
    where
        I: IntoIterator<Item = (S, RawResult)>,
        S: Into<String>,
    {
        Self {
            record_id: record_id.into(),
            payload: BulkPayload::ByField(
                results
                    .into_iter()
                    .map(|(field, result)| (field.into(), result))
                    .collect(),
            ),
        }
    }

    /// Returns true if any contained result has errors.
    pub fn has_errors(&self) -> bool {
        match &self.payload {
            BulkPayload::Single(result) => result.as_ref().is_some_and(RawResult::has_errors),
            BulkPayload::ByField(results) => results.iter().any(|(_, r)| r.has_errors()),
        }
    }
}
