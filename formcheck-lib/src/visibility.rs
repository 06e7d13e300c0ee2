//! Which reports a field shows the user.

use std::collections::HashSet;

use crate::field_state::FieldStates;
use crate::report::Report;

/// A field as the UI renders it.
///
/// Composite reports keyed by a virtual field (e.g. `password` comparing
/// `password1` and `password2`) list the real fields in `depends_on`; their
/// interaction state decides visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWatch {
    pub field: String,
    pub depends_on: Vec<String>,
}

impl FieldWatch {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Fields whose interaction state is consulted.
    pub fn watched(&self) -> &[String] {
        if self.depends_on.is_empty() {
            std::slice::from_ref(&self.field)
        } else {
            &self.depends_on
        }
    }
}

/// Returns true if `report` is visible when watching `watched`.
///
/// Visible when a watched field was touched, or when a watched field has no
/// interaction state yet and caused the report (a programmatic change).
pub fn is_visible(watched: &[String], states: &FieldStates, report: &Report) -> bool {
    watched.iter().any(|field| match states.get(field) {
        Some(state) => state.is_touched(),
        None => report.is_caused_by(field),
    })
}

/// Reports of `watch.field` to show, de-duplicated by message.
pub fn visible_reports<'a>(
    watch: &FieldWatch,
    states: &FieldStates,
    reports: &'a [Report],
) -> Vec<&'a Report> {
    let mut seen = HashSet::new();
    reports
        .iter()
        .filter(|r| r.field_name == watch.field)
        .filter(|r| seen.insert(r.message.as_deref()))
        .filter(|r| is_visible(watch.watched(), states, r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_state::FieldState;
    use crate::model::RecordId;

    fn error(field: &str, message: &str, causes: &[&str]) -> Report {
        let mut report = Report::error(RecordId(1), "Rule", field, message);
        report.caused_by_fields = causes.iter().map(|c| c.to_string()).collect();
        report
    }

    fn states(entries: &[(&str, FieldState)]) -> FieldStates {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_hidden_until_touched() {
        let reports = [error("username", "Field is required", &["username"])];
        let mut s = states(&[("username", FieldState::default())]);
        let watch = FieldWatch::new("username");

        assert!(visible_reports(&watch, &s, &reports).is_empty());

        s.insert("username".into(), FieldState::TOUCHED);
        assert_eq!(visible_reports(&watch, &s, &reports).len(), 1);
    }

    #[test]
    fn test_programmatic_change_visible_without_state() {
        let reports = [error("username", "Field is required", &["username"])];
        let watch = FieldWatch::new("username");

        assert_eq!(visible_reports(&watch, &FieldStates::new(), &reports).len(), 1);
    }

    #[test]
    fn test_composite_watches_dependencies() {
        let reports = [error("password", "Must be equal", &["password1", "password2"])];
        let watch = FieldWatch::new("password").depends_on(["password1", "password2"]);
        let s = states(&[
            ("password1", FieldState::default()),
            (
                "password2",
                FieldState {
                    is_dirty: true,
                    was_focused: false,
                },
            ),
        ]);

        assert_eq!(visible_reports(&watch, &s, &reports).len(), 1);
    }

    #[test]
    fn test_dedupe_by_message() {
        let reports = [
            error("username", "Field is required", &["username"]),
            error("username", "Field is required", &["username"]),
            error("username", "Is too short", &["username"]),
        ];
        let s = states(&[("username", FieldState::TOUCHED)]);

        let shown = visible_reports(&FieldWatch::new("username"), &s, &reports);
        assert_eq!(shown.len(), 2);
    }
}
