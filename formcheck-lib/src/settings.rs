//! Session tunables for the mock backend and the example async rules.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Latency and error injection for the mock collaborators.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use formcheck_lib::settings::MockSettings;
///
/// let settings = MockSettings::default()
///     .with_submit_delay(Duration::from_millis(200))
///     .with_submit_returns_errors(true);
///
/// assert_eq!(settings.async_validation_delay, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSettings {
    /// How long the mock backend takes to answer a submission.
    ///
    /// Default: 1.5 seconds
    pub submit_delay: Duration,

    /// Whether the mock backend rejects submissions with validation problems.
    ///
    /// Default: false
    pub submit_returns_errors: bool,

    /// How long the example async rules take to resolve.
    ///
    /// Default: 2 seconds
    pub async_validation_delay: Duration,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            submit_delay: Duration::from_millis(1500),
            submit_returns_errors: false,
            async_validation_delay: Duration::from_secs(2),
        }
    }
}

impl MockSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings without any artificial latency.
    pub fn instant() -> Self {
        Self {
            submit_delay: Duration::ZERO,
            async_validation_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the submission delay.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Sets whether submissions are rejected.
    pub fn with_submit_returns_errors(mut self, enabled: bool) -> Self {
        self.submit_returns_errors = enabled;
        self
    }

    /// Sets the async rule delay.
    pub fn with_async_validation_delay(mut self, delay: Duration) -> Self {
        self.async_validation_delay = delay;
        self
    }
}

/// Shared, mutable [`MockSettings`] for one session.
///
/// Readers take a snapshot at call time, so changes apply to the next
/// submission or rule evaluation.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<MockSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: MockSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Current settings.
    pub fn get(&self) -> MockSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the settings in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MockSettings),
    {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut settings);
    }
}

impl From<MockSettings> for SettingsHandle {
    fn from(settings: MockSettings) -> Self {
        Self::new(settings)
    }
}
