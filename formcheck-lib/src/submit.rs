//! Submission boundary.
//!
//! The session hands its records to a [`SubmitBackend`] and understands two
//! replies: accepted, or rejected with per-record validation problems.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::model::{Record, RecordId};
use crate::report::{Report, Severity};
use crate::settings::SettingsHandle;

/// Status code of a reply carrying validation problems.
pub const STATUS_PROBLEMS: u16 = 406;

/// Rule name of reports created from server problems.
pub const SERVER_RULE: &str = "Server";

/// Something records can be submitted to.
#[async_trait]
pub trait SubmitBackend: Send + Sync {
    /// Submit `records` and return the raw reply.
    async fn submit(&self, records: &[Record]) -> Result<SubmitReply, SubmitError>;
}

/// Raw reply of a [`SubmitBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReply {
    pub status_code: u16,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A field problem found by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub record_id: RecordId,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub message: String,
}

impl Problem {
    pub fn new(
        record_id: RecordId,
        field_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            record_id,
            field_name: field_name.into(),
            severity: None,
            message: message.into(),
        }
    }

    /// Convert into a report. Problems without a severity are errors.
    pub fn into_report(self) -> Report {
        let mut report = Report::error(self.record_id, SERVER_RULE, self.field_name, self.message);
        report.severity = self.severity.unwrap_or(Severity::Error);
        report
    }
}

#[derive(Debug, Deserialize)]
struct ProblemsBody {
    #[serde(default)]
    problems: Vec<Problem>,
}

/// Interpreted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    /// The records were accepted.
    Accepted(serde_json::Value),
    /// The server found problems with some records.
    Rejected(Vec<Report>),
}

impl SubmitReply {
    /// A 200 reply with an empty body.
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            data: serde_json::json!({}),
        }
    }

    /// A 406 reply listing `problems`.
    pub fn problems(problems: Vec<Problem>) -> Result<Self, SubmitError> {
        Ok(Self {
            status_code: STATUS_PROBLEMS,
            data: serde_json::json!({ "problems": serde_json::to_value(problems)? }),
        })
    }

    /// Classify the reply.
    pub fn interpret(self) -> Result<SubmitResponse, SubmitError> {
        match self.status_code {
            200..=299 => Ok(SubmitResponse::Accepted(self.data)),
            STATUS_PROBLEMS => {
                let body: ProblemsBody = serde_json::from_value(self.data)?;
                Ok(SubmitResponse::Rejected(
                    body.problems.into_iter().map(Problem::into_report).collect(),
                ))
            }
            status => Err(SubmitError::UnexpectedStatus { status }),
        }
    }
}

/// In-process backend with tunable latency and error injection.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    settings: SettingsHandle,
}

impl MockBackend {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SubmitBackend for MockBackend {
    async fn submit(&self, records: &[Record]) -> Result<SubmitReply, SubmitError> {
        let settings = self.settings.get();
        tokio::time::sleep(settings.submit_delay).await;

        if !settings.submit_returns_errors {
            log::debug!("Mock backend accepted {} record(s)", records.len());
            return Ok(SubmitReply::ok());
        }

        let problems = records
            .iter()
            .map(|r| Problem::new(r.id(), "username", "This is error from backend!"))
            .collect();
        log::debug!("Mock backend rejected {} record(s)", records.len());
        SubmitReply::problems(problems)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_statuses() {
        let reply = SubmitReply {
            status_code: 201,
            data: json!({ "saved": 2 }),
        };
        assert_eq!(
            reply.interpret().unwrap(),
            SubmitResponse::Accepted(json!({ "saved": 2 }))
        );
    }

    #[test]
    fn test_problems_become_server_reports() {
        let reply = SubmitReply {
            status_code: 406,
            data: json!({
                "problems": [
                    { "recordId": 3, "fieldName": "username", "message": "taken" },
                    { "recordId": 4, "fieldName": "fullName", "severity": "warning", "message": "odd" }
                ]
            }),
        };

        let SubmitResponse::Rejected(reports) = reply.interpret().unwrap() else {
            panic!("expected rejection");
        };
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].rule_name, SERVER_RULE);
        assert_eq!(reports[0].record_id, RecordId(3));
        assert!(reports[0].is_error());
        assert!(reports[1].is_warning());
        assert_eq!(reports[1].caused_by_fields, vec!["fullName".to_string()]);
    }

    #[test]
    fn test_malformed_problems() {
        let reply = SubmitReply {
            status_code: 406,
            data: json!({ "problems": [{ "recordId": "x" }] }),
        };
        assert!(matches!(
            reply.interpret(),
            Err(SubmitError::MalformedProblems(_))
        ));
    }

    #[test]
    fn test_unexpected_status() {
        let reply = SubmitReply {
            status_code: 500,
            data: json!(null),
        };
        assert!(matches!(
            reply.interpret(),
            Err(SubmitError::UnexpectedStatus { status: 500 })
        ));
    }

    #[tokio::test]
    async fn test_mock_backend_injects_errors() {
        let settings = SettingsHandle::new(
            crate::settings::MockSettings::instant().with_submit_returns_errors(true),
        );
        let backend = MockBackend::new(settings);
        let records = vec![Record::new(1), Record::new(2)];

        let reply = backend.submit(&records).await.unwrap();
        assert_eq!(reply.status_code, 406);

        let SubmitResponse::Rejected(reports) = reply.interpret().unwrap() else {
            panic!("expected rejection");
        };
        assert_eq!(reports.len(), 2);
    }
}
