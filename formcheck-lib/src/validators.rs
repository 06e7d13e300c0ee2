//! Example rules.
//!
//! Each function returns a [`RuleBuilder`] with targets and evaluation set,
//! so callers can still add `stop_on_error` or `skip_if_failed`.

use std::sync::Arc;

use serde_json::json;

use crate::error::{RuleError, SetupError};
use crate::model::Record;
use crate::report::{BulkResult, RawResult};
use crate::rule::{Rule, RuleBuilder};
use crate::settings::SettingsHandle;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Error when `field` is null or empty.
pub fn is_required(field: &str) -> RuleBuilder {
    let target = field.to_string();
    Rule::builder("IsRequired", field)
        .targets([field])
        .check(move |record| {
            record
                .value(&target)
                .is_empty()
                .then(|| RawResult::errors(["Field is required"]))
        })
}

/// Error when the text in `field` is shorter than `from` or longer than `to`
/// characters.
pub fn length_range(field: &str, from: usize, to: usize) -> RuleBuilder {
    let target = field.to_string();
    Rule::builder("LengthRange", field)
        .targets([field])
        .check(move |record| {
            let length = record.get_str(&target).map_or(0, |s| s.chars().count());
            if length < from {
                Some(RawResult::errors(["Is too short"]))
            } else if length > to {
                Some(RawResult::errors(["Is too long"]))
            } else {
                None
            }
        })
}

/// Warning when `field` contains one of `words`, ignoring case.
pub fn no_blocked_words<I, S>(field: &str, words: I) -> RuleBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let target = field.to_string();
    let words: Vec<String> = words
        .into_iter()
        .map(|w| w.into().to_lowercase())
        .collect();
    Rule::builder("NoBlockedWords", field)
        .targets([field])
        .check(move |record| {
            let value = record.get_str(&target)?.to_lowercase();
            words
                .iter()
                .any(|w| value.contains(w.as_str()))
                .then(|| RawResult::warnings(["Value should not contain blocked words"]))
        })
}

/// Error under the (usually virtual) `field` when fields `a` and `b` differ.
pub fn must_be_equal(field: &str, a: &str, b: &str, message: Option<&str>) -> RuleBuilder {
    let (left, right) = (a.to_string(), b.to_string());
    let message = message.unwrap_or("Must be equal").to_string();
    Rule::builder("MustBeEqual", field)
        .targets([a, b])
        .check(move |record| {
            (record.value(&left) != record.value(&right))
                .then(|| RawResult::errors([message.clone()]))
        })
}

/// Async check that `field` is not one of the `taken` names.
///
/// Resolves after the session's async validation delay.
pub fn is_unique_async<I, S>(field: &str, taken: I, settings: SettingsHandle) -> RuleBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let target = field.to_string();
    let taken: Arc<Vec<String>> = Arc::new(taken.into_iter().map(Into::into).collect());
    Rule::builder("IsUniqueAsync", field)
        .targets([field])
        .check_async(move |record: Record| {
            let delay = settings.get().async_validation_delay;
            let taken = Arc::clone(&taken);
            let target = target.clone();
            async move {
                log::debug!("Async validation IsUniqueAsync started");
                tokio::time::sleep(delay).await;

                let value = record.get_str(&target).unwrap_or_default();
                Ok(taken
                    .iter()
                    .any(|t| t == value)
                    .then(|| RawResult::errors([format!("Username {value} is already registered")])))
            }
        })
}

/// Async check of an uploaded image in `field`.
///
/// A PNG yields a valid result carrying `{ width, height, bytes }`. Any
/// other non-empty blob fails with code 415. Empty values pass; pair this
/// with [`is_required`] when the image is mandatory.
pub fn validate_image(field: &str, settings: SettingsHandle) -> RuleBuilder {
    let target = field.to_string();
    Rule::builder("ValidateImage", field)
        .targets([field])
        .check_async(move |record: Record| {
            let delay = settings.get().async_validation_delay;
            let target = target.clone();
            async move {
                log::debug!("Async validation ValidateImage started");
                tokio::time::sleep(delay).await;

                let Some(blob) = record.value(&target).as_bytes() else {
                    return Ok(None);
                };
                if blob.is_empty() {
                    return Ok(None);
                }
                let (width, height) = png_dimensions(blob)
                    .ok_or_else(|| RuleError::with_code(415, "Unsupported image format"))?;
                Ok(Some(RawResult::data(json!({
                    "width": width,
                    "height": height,
                    "bytes": blob.len(),
                }))))
            }
        })
}

/// Read width and height from a PNG header.
pub fn png_dimensions(blob: &[u8]) -> Option<(u32, u32)> {
    if blob.len() < 24 || blob[..8] != PNG_SIGNATURE || blob[12..16] != *b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(blob[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(blob[20..24].try_into().ok()?);
    Some((width, height))
}

/// Async bulk spell check over `targets`.
///
/// Records whose `fullName` equals `forbidden` get an error on `fullName`;
/// all others pass.
pub fn check_spelling_bulk<I, S>(
    field: &str,
    targets: I,
    forbidden: &str,
    settings: SettingsHandle,
) -> RuleBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let forbidden = forbidden.to_string();
    Rule::builder("CheckSpelling", field)
        .targets(targets)
        .check_bulk_async(move |records: Vec<Record>| {
            let delay = settings.get().async_validation_delay;
            let forbidden = forbidden.clone();
            async move {
                log::debug!(
                    "Async bulk validation CheckSpelling started on {} records",
                    records.len()
                );
                tokio::time::sleep(delay).await;

                Ok(records
                    .iter()
                    .map(|record| {
                        if record.get_str("fullName") == Some(forbidden.as_str()) {
                            BulkResult::by_field(
                                record.id(),
                                [(
                                    "fullName",
                                    RawResult::errors([format!("Fullname cannot be \"{forbidden}\"")]),
                                )],
                            )
                        } else {
                            BulkResult::valid(record.id())
                        }
                    })
                    .collect())
            }
        })
}

/// The rule set of the demo user form.
pub fn demo_rules(settings: &SettingsHandle) -> Result<Vec<Rule>, SetupError> {
    Ok(vec![
        is_required("username").build()?,
        length_range("username", 3, 32).stop_on_error(true).build()?,
        no_blocked_words("username", ["admin", "root"]).build()?,
        is_unique_async("username", ["bob"], settings.clone()).build()?,
        is_required("fullName").stop_on_error(true).build()?,
        is_required("password1").stop_on_error(true).build()?,
        is_required("password2").stop_on_error(true).build()?,
        must_be_equal("password", "password1", "password2", Some("Passwords must be equal"))
            .stop_on_error(true)
            .build()?,
        is_required("_imageBlob").stop_on_error(true).build()?,
        validate_image("_imageBlob", settings.clone()).build()?,
        check_spelling_bulk(
            "check-spelling",
            ["username", "fullName"],
            "john",
            settings.clone(),
        )
        .skip_if_failed(["username", "fullName"])
        .build()?,
    ])
}

/// A minimal PNG header with the given size, for tests and demos.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut blob = PNG_SIGNATURE.to_vec();
    blob.extend_from_slice(&13u32.to_be_bytes());
    blob.extend_from_slice(b"IHDR");
    blob.extend_from_slice(&width.to_be_bytes());
    blob.extend_from_slice(&height.to_be_bytes());
    blob.extend_from_slice(&[8, 6, 0, 0, 0]);
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Outcome;
    use crate::settings::MockSettings;

    fn run(rule: &Rule, record: &Record) -> Option<RawResult> {
        match rule.record_fn().unwrap()(record) {
            Outcome::Ready(result) => result.unwrap(),
            Outcome::Pending(_) => panic!("expected a synchronous rule"),
        }
    }

    async fn run_async(rule: &Rule, record: &Record) -> Result<Option<RawResult>, RuleError> {
        match rule.record_fn().unwrap()(record) {
            Outcome::Ready(result) => result,
            Outcome::Pending(future) => future.await,
        }
    }

    #[test]
    fn test_is_required() {
        let rule = is_required("username").build().unwrap();
        assert!(run(&rule, &Record::new(1).set("username", "")).is_some());
        assert!(run(&rule, &Record::new(1)).is_some());
        assert!(run(&rule, &Record::new(1).set("username", "ann")).is_none());
    }

    #[test]
    fn test_length_range() {
        let rule = length_range("username", 3, 5).build().unwrap();
        let short = run(&rule, &Record::new(1).set("username", "ab")).unwrap();
        assert_eq!(short.errors, vec!["Is too short"]);
        let long = run(&rule, &Record::new(1).set("username", "abcdef")).unwrap();
        assert_eq!(long.errors, vec!["Is too long"]);
        assert!(run(&rule, &Record::new(1).set("username", "äbc")).is_none());
    }

    #[test]
    fn test_blocked_words_warn() {
        let rule = no_blocked_words("username", ["root"]).build().unwrap();
        let result = run(&rule, &Record::new(1).set("username", "RootUser")).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_must_be_equal_message() {
        let rule = must_be_equal("password", "password1", "password2", Some("Passwords must be equal"))
            .build()
            .unwrap();
        let record = Record::new(1).set("password1", "a").set("password2", "b");
        assert_eq!(
            run(&rule, &record).unwrap().errors,
            vec!["Passwords must be equal"]
        );
        assert_eq!(rule.target_fields(), ["password1", "password2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_unique_async() {
        let settings = SettingsHandle::new(MockSettings::default());
        let rule = is_unique_async("username", ["bob"], settings).build().unwrap();

        let taken = run_async(&rule, &Record::new(1).set("username", "bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(taken.errors, vec!["Username bob is already registered"]);

        let free = run_async(&rule, &Record::new(1).set("username", "ann")).await;
        assert!(free.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_image() {
        let rule = validate_image("_imageBlob", MockSettings::instant().into())
            .build()
            .unwrap();

        let png = Record::new(1).set("_imageBlob", png_header(200, 150));
        let data = run_async(&rule, &png).await.unwrap().unwrap().data.unwrap();
        assert_eq!(data["width"], 200);
        assert_eq!(data["height"], 150);

        let jpeg = Record::new(1).set("_imageBlob", vec![0xff, 0xd8, 0xff, 0xe0]);
        let err = run_async(&rule, &jpeg).await.unwrap_err();
        assert_eq!(err.code(), Some(415));
    }

    #[test]
    fn test_png_dimensions_rejects_short() {
        assert_eq!(png_dimensions(&PNG_SIGNATURE), None);
        assert_eq!(png_dimensions(&png_header(3, 4)), Some((3, 4)));
    }

    #[test]
    fn test_demo_rules_are_valid() {
        let rules = demo_rules(&SettingsHandle::default()).unwrap();
        assert!(crate::rule::RuleSet::new(rules).is_ok());
    }
}
