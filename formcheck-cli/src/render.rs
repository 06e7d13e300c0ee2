//! Plain-text rendering of a session, standing in for a form UI.

use formcheck_lib::collection::{SubmitOutcome, ValidatedCollection};
use formcheck_lib::model::{Record, Value};
use formcheck_lib::visibility::FieldWatch;

/// Fields the form shows, in display order.
fn watches() -> Vec<FieldWatch> {
    vec![
        FieldWatch::new("username"),
        FieldWatch::new("fullName"),
        FieldWatch::new("password1"),
        FieldWatch::new("password2"),
        FieldWatch::new("password").depends_on(["password1", "password2"]),
        FieldWatch::new("_imageBlob"),
    ]
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) if s.is_empty() => "\"\"".to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Bytes(b) => format!("<{} bytes>", b.len()),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
    }
}

fn print_record(session: &ValidatedCollection, record: &Record) {
    let id = record.id();
    println!("  record {id}");

    for watch in watches() {
        let validating = session.validating_fields(id).contains(&watch.field.as_str());
        let value = record
            .get(&watch.field)
            .map(display)
            .unwrap_or_default();
        let marker = if validating { " (validating...)" } else { "" };
        println!("    {:<12} {value}{marker}", watch.field);

        for report in session.visible_reports(id, &watch) {
            let message = report.message.as_deref().unwrap_or_default();
            println!("      [{:?}] {message}", report.severity);
        }
    }

    for report in session.reports(id).iter().filter(|r| r.data.is_some()) {
        if let Some(data) = &report.data {
            println!("    {} data: {data}", report.field_name);
        }
    }
}

/// Print every record with its visible reports, then the statistics.
pub fn print_session(session: &ValidatedCollection, title: &str) {
    println!("== {title}");
    for record in session.records() {
        print_record(session, record);
    }

    let stats = session.statistics();
    println!(
        "  errors: {}, warnings: {}, validating: {}, can submit: {}",
        stats.errors_count,
        stats.warnings_count,
        session.is_validating(),
        session.can_submit()
    );
    println!();
}

pub fn print_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Blocked => println!(">> submit blocked, showing all errors"),
        SubmitOutcome::Accepted(_) => println!(">> records submitted without errors"),
        SubmitOutcome::Rejected { problems } => {
            println!(">> server rejected the submission with {problems} problem(s)")
        }
    }
}
