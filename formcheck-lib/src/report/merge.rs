use std::collections::HashSet;

use super::Report;

/// Merge a batch of fresh reports for one record into the stored ones.
///
/// An old report is dropped when the batch has a report from the same rule
/// (same rule name and `caused_by_fields`), or when the batch covers its
/// field and it is not a `Valid` report carrying data. Valid reports with
/// data therefore survive until their own rule runs again.
///
/// Errors, warnings and data-carrying valid reports from the batch are kept;
/// plain valid reports only serve to clear.
pub fn merge_reports(existing: &mut Vec<Report>, batch: &[Report]) {
    let owners: HashSet<(&str, &[String])> = batch
        .iter()
        .map(|r| (r.rule_name.as_str(), r.caused_by_fields.as_slice()))
        .collect();
    let fields: HashSet<&str> = batch.iter().map(|r| r.field_name.as_str()).collect();

    existing.retain(|old| {
        if owners.contains(&(old.rule_name.as_str(), old.caused_by_fields.as_slice())) {
            return false;
        }
        !fields.contains(old.field_name.as_str()) || is_data_carrier(old)
    });

    existing.extend(
        batch
            .iter()
            .filter(|r| !r.is_valid() || r.data.is_some())
            .cloned(),
    );
}

fn is_data_carrier(report: &Report) -> bool {
    report.is_valid() && report.data.is_some()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::RecordId;
    use crate::report::Severity;

    fn report(rule: &str, field: &str, severity: Severity, causes: &[&str]) -> Report {
        Report {
            record_id: RecordId(1),
            rule_name: rule.into(),
            field_name: field.into(),
            severity,
            message: (severity != Severity::Valid).then(|| format!("{rule} on {field}")),
            data: None,
            caused_by_fields: causes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_field_batch_replaces_old_failures() {
        let mut stored = vec![
            report("IsRequired", "username", Severity::Error, &["username"]),
            report("IsRequired", "fullName", Severity::Error, &["fullName"]),
        ];
        let batch = [report("IsRequired", "username", Severity::Valid, &["username"])];

        merge_reports(&mut stored, &batch);

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].field_name, "fullName");
    }

    #[test]
    fn test_skipped_rule_warning_cleared_by_field() {
        let mut stored = vec![report(
            "NoBlockedWords",
            "username",
            Severity::Warning,
            &["username"],
        )];
        let batch = [report("LengthRange", "username", Severity::Error, &["username"])];

        merge_reports(&mut stored, &batch);

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rule_name, "LengthRange");
    }

    #[test]
    fn test_same_rule_other_field_replaced() {
        // Spell check reported on fullName, now passes under its own field
        let causes = ["username", "fullName"];
        let mut stored = vec![report("CheckSpelling", "fullName", Severity::Error, &causes)];
        let batch = [report("CheckSpelling", "check-spelling", Severity::Valid, &causes)];

        merge_reports(&mut stored, &batch);

        assert!(stored.is_empty());
    }

    #[test]
    fn test_data_persists_until_owner_reruns() {
        let mut image = report("ValidateImage", "_imageBlob", Severity::Valid, &["_imageBlob"]);
        image.data = Some(json!({ "width": 200 }));
        let mut stored = vec![image.clone()];

        // Required check fails and the image rule is skipped
        let batch = [report("IsRequired", "_imageBlob", Severity::Error, &["_imageBlob"])];
        merge_reports(&mut stored, &batch);
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|r| r.data.is_some()));

        // Image rule runs again and replaces its data
        let mut rerun = image;
        rerun.data = Some(json!({ "width": 300 }));
        merge_reports(&mut stored, &[rerun]);
        let data: Vec<_> = stored.iter().filter_map(|r| r.data.clone()).collect();
        assert_eq!(data, vec![json!({ "width": 300 })]);
    }
}
