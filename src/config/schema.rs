//! Configuration schema: the fixed key set and the persisted document
//!
//! Keys, types and defaults are implementation-fixed. Every field has a
//! typed accessor pair on `ConfigStore`; there is no string-keyed dynamic
//! access.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::profile::ProfileMap;
use crate::constants::defaults;

/// Identifier for one logical configuration key.
///
/// Change notification is granular per key: a write to one key notifies
/// only that key's subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    AllowedMimeTypes,
    AutoRotate,
    AutoStart,
    CurrentProfile,
    IconPreview,
    IntegrateSystemMenu,
    Interval,
    LockscreenProfile,
    Notifications,
    Profiles,
    Random,
    RememberProfileState,
    Rotation,
    UpdateLockscreen,
    NextWallpaper,
    PrevWallpaper,
}

impl ConfigKey {
    /// Schema name of the key, as it appears in the settings document
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::AllowedMimeTypes => "allowed-mime-types",
            ConfigKey::AutoRotate => "auto-rotate",
            ConfigKey::AutoStart => "auto-start",
            ConfigKey::CurrentProfile => "current-profile",
            ConfigKey::IconPreview => "icon-preview",
            ConfigKey::IntegrateSystemMenu => "integrate-system-menu",
            ConfigKey::Interval => "interval",
            ConfigKey::LockscreenProfile => "lockscreen-profile",
            ConfigKey::Notifications => "notifications",
            ConfigKey::Profiles => "profiles",
            ConfigKey::Random => "random",
            ConfigKey::RememberProfileState => "remember-profile-state",
            ConfigKey::Rotation => "rotation",
            ConfigKey::UpdateLockscreen => "update-lockscreen",
            ConfigKey::NextWallpaper => "next-wallpaper",
            ConfigKey::PrevWallpaper => "prev-wallpaper",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wallpaper rotation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Interval,
    Hourly,
    Disabled,
}

impl Rotation {
    pub fn label(self) -> &'static str {
        match self {
            Rotation::Interval => "Interval Timer",
            Rotation::Hourly => "Beginning of Hour",
            Rotation::Disabled => "Disabled",
        }
    }
}

/// The two global shortcut slots owned by this applet.
///
/// Each persists a single accelerator string (or empty) in the settings
/// document; writes go through `KeybindingManager` which performs conflict
/// detection first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeybindingAction {
    NextWallpaper,
    PrevWallpaper,
}

impl KeybindingAction {
    pub const ALL: [KeybindingAction; 2] =
        [KeybindingAction::NextWallpaper, KeybindingAction::PrevWallpaper];

    pub fn key(self) -> ConfigKey {
        match self {
            KeybindingAction::NextWallpaper => ConfigKey::NextWallpaper,
            KeybindingAction::PrevWallpaper => ConfigKey::PrevWallpaper,
        }
    }

    pub fn name(self) -> &'static str {
        self.key().name()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

impl fmt::Display for KeybindingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted settings document.
///
/// Serialized pretty-printed to `settings.json`; absent fields fall back to
/// the schema defaults so partially written or older documents still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default = "default_true")]
    pub auto_rotate: bool,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_profile_name")]
    pub current_profile: String,
    #[serde(default)]
    pub icon_preview: bool,
    #[serde(default)]
    pub integrate_system_menu: bool,
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Empty string means "inherit from the desktop profile"
    #[serde(default)]
    pub lockscreen_profile: String,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_profiles")]
    pub profiles: ProfileMap,
    #[serde(default = "default_true")]
    pub random: bool,
    #[serde(default)]
    pub remember_profile_state: bool,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_true")]
    pub update_lockscreen: bool,
    #[serde(default)]
    pub next_wallpaper: String,
    #[serde(default)]
    pub prev_wallpaper: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_mime_types: default_allowed_mime_types(),
            auto_rotate: true,
            auto_start: false,
            current_profile: default_profile_name(),
            icon_preview: false,
            integrate_system_menu: false,
            interval: default_interval(),
            lockscreen_profile: String::new(),
            notifications: true,
            profiles: default_profiles(),
            random: true,
            remember_profile_state: false,
            rotation: Rotation::default(),
            update_lockscreen: true,
            next_wallpaper: String::new(),
            prev_wallpaper: String::new(),
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_allowed_mime_types() -> Vec<String> {
    defaults::ALLOWED_MIME_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_profile_name() -> String {
    defaults::PROFILE_NAME.to_string()
}

fn default_interval() -> u32 {
    defaults::INTERVAL_SECONDS
}

fn default_profiles() -> ProfileMap {
    let mut profiles = ProfileMap::new();
    profiles.insert(default_profile_name(), Vec::new());
    profiles
}
