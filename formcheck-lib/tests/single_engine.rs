//! Behaviour of the single-record engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use formcheck_lib::engine::{self, EventReceiver, ValidationEvent, Validator};
use formcheck_lib::error::{EngineError, RuleError, SetupError};
use formcheck_lib::report::{RawResult, Report, Severity};
use formcheck_lib::rule::Rule;
use formcheck_lib::settings::{MockSettings, SettingsHandle};
use formcheck_lib::validators::{is_required, is_unique_async, length_range};
use formcheck_lib::{Record, RecordId};

fn user(username: &str) -> Record {
    Record::new(1).set("username", username).set("fullName", "X")
}

fn always_error(name: &str, field: &str, stop: bool) -> Rule {
    let message = format!("{name} failed");
    Rule::builder(name, field)
        .targets([field])
        .stop_on_error(stop)
        .check(move |_| Some(RawResult::errors([message.clone()])))
        .build()
        .unwrap()
}

fn counting(name: &str, field: &str, calls: Arc<AtomicUsize>) -> Rule {
    Rule::builder(name, field)
        .targets([field])
        .check(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        })
        .build()
        .unwrap()
}

/// Drain everything already sent.
fn collect(rx: &mut EventReceiver) -> Vec<ValidationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn done_reports(events: &[ValidationEvent]) -> Vec<Report> {
    events
        .iter()
        .filter_map(|e| match e {
            ValidationEvent::Done { reports, .. } => Some(reports.clone()),
            ValidationEvent::Started { .. } => None,
        })
        .flatten()
        .collect()
}

// =============================================================================
// Setup
// =============================================================================

#[test]
fn test_rejects_empty_rules() {
    let (tx, _rx) = engine::channel();
    assert_eq!(Validator::new(Vec::new(), tx).unwrap_err(), SetupError::NoRules);
}

#[test]
fn test_rejects_duplicate_rule_for_field() {
    let (tx, _rx) = engine::channel();
    let err = Validator::new(
        vec![
            is_required("username").build().unwrap(),
            is_required("username").build().unwrap(),
        ],
        tx,
    )
    .unwrap_err();
    assert!(matches!(err, SetupError::Duplicate { .. }));
}

// =============================================================================
// Passes
// =============================================================================

#[tokio::test]
async fn test_required_username_reports_error() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![is_required("username").build().unwrap()], tx).unwrap();

    let pass = validator.activate(user("")).unwrap();
    let id = pass.id();
    pass.wait().await.unwrap();

    let events = collect(&mut rx);
    assert_eq!(events.len(), 2);
    let ValidationEvent::Started { pass, fields } = &events[0] else {
        panic!("expected start first, got {:?}", events[0]);
    };
    assert_eq!(*pass, id);
    assert_eq!(fields[&RecordId(1)], vec!["username".to_string()]);

    let ValidationEvent::Done {
        reports, settled, ..
    } = &events[1]
    else {
        panic!("expected done, got {:?}", events[1]);
    };
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].field_name, "username");
    assert_eq!(reports[0].severity, Severity::Error);
    assert_eq!(settled[&RecordId(1)], vec!["username".to_string()]);
}

#[tokio::test]
async fn test_valid_record_yields_only_valid_reports() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            is_required("username").build().unwrap(),
            length_range("username", 3, 10).build().unwrap(),
            is_required("fullName").build().unwrap(),
        ],
        tx,
    )
    .unwrap();

    validator.activate(user("alice")).unwrap().wait().await.unwrap();

    let reports = done_reports(&collect(&mut rx));
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(Report::is_valid));
}

#[tokio::test]
async fn test_stop_on_error_short_circuits_field() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            always_error("A", "username", true),
            always_error("B", "username", false),
            always_error("C", "fullName", false),
        ],
        tx,
    )
    .unwrap();

    validator.activate(user("x")).unwrap().wait().await.unwrap();

    let names: Vec<String> = done_reports(&collect(&mut rx))
        .into_iter()
        .map(|r| r.rule_name)
        .collect();
    assert_eq!(names, vec!["A", "C"]);
}

#[tokio::test]
async fn test_skip_if_fields_failed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dependent = Rule::builder("Dependent", "summary")
        .targets(["username"])
        .skip_if_failed(["username"])
        .check({
            let calls = Arc::clone(&calls);
            move |_: &Record| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .build()
        .unwrap();

    let (tx, _rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            is_required("username").stop_on_error(true).build().unwrap(),
            dependent,
        ],
        tx,
    )
    .unwrap();

    validator.activate(user("")).unwrap().wait().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    validator.on_record_changed(user("ann")).unwrap().wait().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_only_affected_rules_rerun() {
    let username_calls = Arc::new(AtomicUsize::new(0));
    let name_calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            counting("Counting", "username", Arc::clone(&username_calls)),
            counting("Counting", "fullName", Arc::clone(&name_calls)),
        ],
        tx,
    )
    .unwrap();

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    collect(&mut rx);

    let changed = user("ann").set("fullName", "Ann");
    validator.on_record_changed(changed).unwrap().wait().await.unwrap();

    assert_eq!(username_calls.load(Ordering::SeqCst), 1);
    assert_eq!(name_calls.load(Ordering::SeqCst), 2);

    let events = collect(&mut rx);
    let ValidationEvent::Started { fields, .. } = &events[0] else {
        panic!("expected start");
    };
    assert_eq!(fields[&RecordId(1)], vec!["fullName".to_string()]);
}

#[tokio::test]
async fn test_unrelated_change_schedules_nothing() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![is_required("username").build().unwrap()], tx).unwrap();

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    collect(&mut rx);

    assert!(validator.on_record_changed(user("ann").set("fullName", "Y")).is_none());
    assert!(collect(&mut rx).is_empty());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            is_required("username").build().unwrap(),
            length_range("username", 5, 10).build().unwrap(),
        ],
        tx,
    )
    .unwrap();

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    let first = done_reports(&collect(&mut rx));

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    let second = done_reports(&collect(&mut rx));

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_new_record_id_reactivates() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![is_required("username").build().unwrap()], tx).unwrap();

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    collect(&mut rx);

    let other = Record::new(2).set("username", "ann");
    validator.on_record_changed(other).unwrap().wait().await.unwrap();

    let reports = done_reports(&collect(&mut rx));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].record_id, RecordId(2));
}

#[tokio::test]
async fn test_disabled_does_not_validate() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![is_required("username").build().unwrap()], tx).unwrap();

    validator.activate(user("ann")).unwrap().wait().await.unwrap();
    collect(&mut rx);

    validator.set_enabled(false);
    assert!(validator.on_record_changed(user("")).is_none());
    assert!(collect(&mut rx).is_empty());

    // The change made while disabled is picked up afterwards
    validator.set_enabled(true);
    validator.on_record_changed(user("")).unwrap().wait().await.unwrap();
    let reports = done_reports(&collect(&mut rx));
    assert!(reports[0].is_error());
}

#[tokio::test]
async fn test_activated_while_disabled_runs_every_rule_once_enabled() {
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            is_required("username").build().unwrap(),
            is_required("fullName").build().unwrap(),
        ],
        tx,
    )
    .unwrap();

    validator.set_enabled(false);
    let blank = Record::new(1).set("username", "").set("fullName", "");
    assert!(validator.activate(blank).is_none());
    assert!(validator.record().is_none());

    validator.set_enabled(true);
    let typed = Record::new(1).set("username", "a").set("fullName", "");
    validator.on_record_changed(typed).unwrap().wait().await.unwrap();

    let reports = done_reports(&collect(&mut rx));
    let full_name: Vec<_> = reports.iter().filter(|r| r.field_name == "fullName").collect();
    assert_eq!(full_name.len(), 1);
    assert!(full_name[0].is_error());
    assert!(
        reports
            .iter()
            .any(|r| r.field_name == "username" && r.is_valid())
    );
}

// =============================================================================
// Async rules
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_async_uniqueness() {
    let settings = SettingsHandle::new(MockSettings::default());
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![is_unique_async("username", ["bob"], settings).build().unwrap()],
        tx,
    )
    .unwrap();

    let pass = validator.activate(user("bob")).unwrap();

    // Only the start is out while the rule is pending
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(validator.running_tasks(), 1);
    let events = collect(&mut rx);
    assert!(matches!(events.as_slice(), [ValidationEvent::Started { .. }]));

    pass.wait().await.unwrap();
    let reports = done_reports(&collect(&mut rx));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].record_id, RecordId(1));
    assert_eq!(
        reports[0].message.as_deref(),
        Some("Username bob is already registered")
    );
    assert_eq!(validator.running_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_edit_cancels_stale_async_result() {
    let settings = SettingsHandle::new(MockSettings::default());
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![
            is_required("username").build().unwrap(),
            is_unique_async("username", ["bob"], settings).build().unwrap(),
        ],
        tx,
    )
    .unwrap();

    let first = validator.activate(user("bob")).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = validator.on_record_changed(user("bobby")).unwrap();
    let latest_pass = second.id();
    assert!(latest_pass > first.id());

    let first_pass = first.id();
    first.wait().await.unwrap();
    second.wait().await.unwrap();
    assert_eq!(validator.running_tasks(), 0);

    let events = collect(&mut rx);

    // The cancelled pass delivered nothing from the async rule
    let from_first: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ValidationEvent::Done { pass, reports, .. } if *pass == first_pass => Some(reports),
            _ => None,
        })
        .flatten()
        .collect();
    assert!(!from_first.iter().any(|r| r.rule_name == "IsUniqueAsync"));

    let reports = done_reports(&events);
    assert!(reports.iter().all(|r| r.is_valid()));
    assert!(
        !reports
            .iter()
            .any(|r| r.message.as_deref().is_some_and(|m| m.contains("bob ")))
    );

    // The newer pass delivered both rules
    let latest: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ValidationEvent::Done { pass, reports, .. } if *pass == latest_pass => Some(reports),
            _ => None,
        })
        .flatten()
        .map(|r| r.rule_name.as_str())
        .collect();
    assert_eq!(latest, vec!["IsRequired", "IsUniqueAsync"]);
}

#[tokio::test]
async fn test_recognizable_failure_becomes_report() {
    let upload = Rule::builder("Upload", "_imageBlob")
        .targets(["_imageBlob"])
        .check_async(|_| async { Err(RuleError::with_code(415, "Unsupported image format")) })
        .build()
        .unwrap();
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![upload], tx).unwrap();

    validator
        .activate(Record::new(1).set("_imageBlob", vec![1u8, 2, 3]))
        .unwrap()
        .wait()
        .await
        .unwrap();

    let reports = done_reports(&collect(&mut rx));
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_error());
    assert_eq!(reports[0].message.as_deref(), Some("Unsupported image format"));
}

#[tokio::test]
async fn test_internal_error_fails_the_pass() {
    let broken = Rule::builder("Broken", "username")
        .targets(["username"])
        .evaluate(|_| formcheck_lib::Outcome::Ready(Err(RuleError::internal("index out of range"))))
        .build()
        .unwrap();
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(vec![broken], tx).unwrap();

    let err = validator.activate(user("ann")).unwrap().wait().await.unwrap_err();
    assert!(matches!(err, EngineError::Rule { ref rule, .. } if rule == "Broken"));

    // Announced, never completed
    let events = collect(&mut rx);
    assert!(matches!(events.as_slice(), [ValidationEvent::Started { .. }]));
}

#[tokio::test(start_paused = true)]
async fn test_deactivate_cancels_running() {
    let settings = SettingsHandle::new(MockSettings::default());
    let (tx, mut rx) = engine::channel();
    let mut validator = Validator::new(
        vec![is_unique_async("username", ["bob"], settings).build().unwrap()],
        tx,
    )
    .unwrap();

    let pass = validator.activate(user("bob")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    validator.deactivate();

    pass.wait().await.unwrap();
    assert_eq!(validator.running_tasks(), 0);
    assert!(done_reports(&collect(&mut rx)).is_empty());
}
