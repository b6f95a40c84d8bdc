//! User settings stored in the synced tier.

use serde::{Deserialize, Serialize};

/// Color theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the host color-scheme preference.
    #[default]
    System,
}

impl Theme {
    /// Resolves `System` against the host preference; concrete themes pass through.
    pub fn resolve(self, prefers_dark: bool) -> Theme {
        match self {
            Theme::System if prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            concrete => concrete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

/// Process-wide settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub auto_save: bool,
    pub sync_enabled: bool,
    pub default_expanded: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            auto_save: true,
            sync_enabled: true,
            default_expanded: true,
        }
    }
}

impl Settings {
    /// Returns a copy with every `Some` field of `patch` applied.
    pub fn merged(self, patch: &SettingsPatch) -> Self {
        Self {
            theme: patch.theme.unwrap_or(self.theme),
            auto_save: patch.auto_save.unwrap_or(self.auto_save),
            sync_enabled: patch.sync_enabled.unwrap_or(self.sync_enabled),
            default_expanded: patch.default_expanded.unwrap_or(self.default_expanded),
        }
    }
}

/// Partial settings update; absent fields keep their stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expanded: Option<bool>,
}
