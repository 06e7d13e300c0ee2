//! Per-field interaction state.
//!
//! Engines never read or write this; the host updates it on first edit and
//! on focus loss, and the visibility filter reads it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether the user has interacted with a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub is_dirty: bool,
    pub was_focused: bool,
}

impl FieldState {
    /// Dirty and focused.
    pub const TOUCHED: Self = Self {
        is_dirty: true,
        was_focused: true,
    };

    /// Returns true if the field was edited or has lost focus.
    pub fn is_touched(&self) -> bool {
        self.is_dirty || self.was_focused
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: FieldStatePatch) {
        if let Some(is_dirty) = patch.is_dirty {
            self.is_dirty = is_dirty;
        }
        if let Some(was_focused) = patch.was_focused {
            self.was_focused = was_focused;
        }
    }
}

/// Partial update of a [`FieldState`]. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dirty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_focused: Option<bool>,
}

impl FieldStatePatch {
    pub fn dirty() -> Self {
        Self {
            is_dirty: Some(true),
            was_focused: None,
        }
    }

    pub fn focused() -> Self {
        Self {
            is_dirty: None,
            was_focused: Some(true),
        }
    }
}

/// Interaction state of one record, by field name.
pub type FieldStates = BTreeMap<String, FieldState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_keeps_unset() {
        let mut state = FieldState {
            is_dirty: true,
            was_focused: false,
        };
        state.apply(FieldStatePatch::focused());
        assert_eq!(state, FieldState::TOUCHED);
    }

    #[test]
    fn test_untouched_by_default() {
        assert!(!FieldState::default().is_touched());
        assert!(FieldState::TOUCHED.is_touched());
    }

    #[test]
    fn test_serde_camel_case() {
        let json = serde_json::to_value(FieldState::TOUCHED).unwrap();
        assert_eq!(json, serde_json::json!({ "isDirty": true, "wasFocused": true }));
    }
}
