//! Typed configuration store with per-key change notification
//!
//! Single source of truth for the persisted settings document. Writes are
//! validated, persisted, then notified synchronously: every subscriber of
//! the affected key runs before `set` returns, in subscription order.
//! Invalid values are rejected without mutating and without notifying,
//! logged rather than surfaced (the prior value stays intact).
//!
//! The store is created once per process and shared by cheap handle clones.
//! The persisted file is also read by the rotation daemon and any external
//! editor; cross-process consistency is last-write-wins, only in-process
//! ordering is guaranteed here.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{error, info, warn};

use crate::config::profile::ProfileMap;
use crate::config::schema::{ConfigKey, KeybindingAction, Rotation, Settings};
use crate::config::subscriptions::{Callback, OwnerId, SubscriptionId, SubscriptionRegistry};

/// Shared handle to the configuration store.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Rc<RefCell<StoreInner>>,
}

struct StoreInner {
    settings: Settings,
    path: PathBuf,
    registry: SubscriptionRegistry<ConfigKey, ConfigKey>,
}

impl ConfigStore {
    /// Default settings path under the XDG config directory.
    pub fn default_path() -> PathBuf {
        #[cfg(not(test))]
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        #[cfg(test)]
        let mut path = std::env::temp_dir().join("wallshift-test");

        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Load the settings document from `path`, creating it with schema
    /// defaults when absent.
    pub fn load(path: PathBuf) -> Result<Self> {
        let settings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON from {:?}", path))?
        } else {
            info!(path = %path.display(), "Settings file not found, creating defaults");
            Settings::default()
        };

        let store = Self {
            inner: Rc::new(RefCell::new(StoreInner {
                settings,
                path,
                registry: SubscriptionRegistry::new(),
            })),
        };

        if !store.inner.borrow().path.exists() {
            store.inner.borrow().persist();
        }

        Ok(store)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe(
        &self,
        owner: OwnerId,
        key: ConfigKey,
        callback: Callback<ConfigKey>,
    ) -> SubscriptionId {
        self.inner.borrow_mut().registry.subscribe(owner, key, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.borrow_mut().registry.unsubscribe(id);
    }

    pub fn dispose_all(&self, owner: OwnerId) {
        self.inner.borrow_mut().registry.dispose_all(owner);
    }

    pub fn active_subscriptions(&self, owner: OwnerId) -> usize {
        self.inner.borrow().registry.active_count(owner)
    }

    /// Invoke every subscriber of `key`, synchronously, in subscription
    /// order. The registry borrow is released before callbacks run so they
    /// may freely read or write the store.
    fn notify(&self, key: ConfigKey) {
        let callbacks = self.inner.borrow().registry.callbacks_for(key);
        for cb in callbacks {
            (&mut *cb.borrow_mut())(&key);
        }
    }

    /// Commit an accepted write: mutate, persist, then notify exactly once.
    fn commit(&self, key: ConfigKey, apply: impl FnOnce(&mut Settings)) {
        {
            let mut inner = self.inner.borrow_mut();
            apply(&mut inner.settings);
            inner.persist();
        }
        self.notify(key);
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    pub fn allowed_mime_types(&self) -> Vec<String> {
        self.inner.borrow().settings.allowed_mime_types.clone()
    }

    pub fn set_allowed_mime_types(&self, value: Vec<String>) {
        self.commit(ConfigKey::AllowedMimeTypes, |s| s.allowed_mime_types = value);
    }

    pub fn auto_rotate(&self) -> bool {
        self.inner.borrow().settings.auto_rotate
    }

    pub fn set_auto_rotate(&self, value: bool) {
        self.commit(ConfigKey::AutoRotate, |s| s.auto_rotate = value);
    }

    pub fn auto_start(&self) -> bool {
        self.inner.borrow().settings.auto_start
    }

    pub fn set_auto_start(&self, value: bool) {
        self.commit(ConfigKey::AutoStart, |s| s.auto_start = value);
    }

    pub fn current_profile(&self) -> String {
        self.inner.borrow().settings.current_profile.clone()
    }

    pub fn set_current_profile(&self, value: &str) {
        let value = value.to_string();
        self.commit(ConfigKey::CurrentProfile, |s| s.current_profile = value);
    }

    pub fn icon_preview(&self) -> bool {
        self.inner.borrow().settings.icon_preview
    }

    pub fn set_icon_preview(&self, value: bool) {
        self.commit(ConfigKey::IconPreview, |s| s.icon_preview = value);
    }

    pub fn integrate_system_menu(&self) -> bool {
        self.inner.borrow().settings.integrate_system_menu
    }

    pub fn set_integrate_system_menu(&self, value: bool) {
        self.commit(ConfigKey::IntegrateSystemMenu, |s| s.integrate_system_menu = value);
    }

    pub fn interval(&self) -> u32 {
        self.inner.borrow().settings.interval
    }

    /// Set the rotation interval in seconds. Values below one second are
    /// rejected without mutating or notifying.
    pub fn set_interval(&self, value: i64) {
        if value < 1 || value > i64::from(u32::MAX) {
            warn!(value, "Rejected invalid interval, keeping previous value");
            return;
        }
        let value = value as u32;
        self.commit(ConfigKey::Interval, |s| s.interval = value);
    }

    pub fn lockscreen_profile(&self) -> String {
        self.inner.borrow().settings.lockscreen_profile.clone()
    }

    /// Set the lockscreen profile. A value equal to the current desktop
    /// profile is normalized to the empty inherit sentinel before the write.
    pub fn set_lockscreen_profile(&self, value: &str) {
        let normalized = if value == self.current_profile() {
            String::new()
        } else {
            value.to_string()
        };
        self.commit(ConfigKey::LockscreenProfile, |s| s.lockscreen_profile = normalized);
    }

    pub fn notifications(&self) -> bool {
        self.inner.borrow().settings.notifications
    }

    pub fn set_notifications(&self, value: bool) {
        self.commit(ConfigKey::Notifications, |s| s.notifications = value);
    }

    pub fn profiles(&self) -> ProfileMap {
        self.inner.borrow().settings.profiles.clone()
    }

    /// Replace the whole profile map. Atomic from the caller's perspective:
    /// subscribers observe either the previous map or the new one, never a
    /// partial write. Notifies only `profiles` subscribers.
    pub fn set_profiles(&self, value: ProfileMap) {
        self.commit(ConfigKey::Profiles, |s| s.profiles = value);
    }

    pub fn random(&self) -> bool {
        self.inner.borrow().settings.random
    }

    pub fn set_random(&self, value: bool) {
        self.commit(ConfigKey::Random, |s| s.random = value);
    }

    pub fn remember_profile_state(&self) -> bool {
        self.inner.borrow().settings.remember_profile_state
    }

    pub fn set_remember_profile_state(&self, value: bool) {
        self.commit(ConfigKey::RememberProfileState, |s| s.remember_profile_state = value);
    }

    pub fn rotation(&self) -> Rotation {
        self.inner.borrow().settings.rotation
    }

    pub fn set_rotation(&self, value: Rotation) {
        self.commit(ConfigKey::Rotation, |s| s.rotation = value);
    }

    pub fn update_lockscreen(&self) -> bool {
        self.inner.borrow().settings.update_lockscreen
    }

    pub fn set_update_lockscreen(&self, value: bool) {
        self.commit(ConfigKey::UpdateLockscreen, |s| s.update_lockscreen = value);
    }

    pub fn keybinding(&self, action: KeybindingAction) -> String {
        let inner = self.inner.borrow();
        match action {
            KeybindingAction::NextWallpaper => inner.settings.next_wallpaper.clone(),
            KeybindingAction::PrevWallpaper => inner.settings.prev_wallpaper.clone(),
        }
    }

    /// Persist an accelerator string for a shortcut slot.
    ///
    /// Callers should go through `KeybindingManager::set_accelerator`, which
    /// performs conflict detection before delegating here.
    pub fn set_keybinding(&self, action: KeybindingAction, value: &str) {
        let value = value.to_string();
        self.commit(action.key(), |s| match action {
            KeybindingAction::NextWallpaper => s.next_wallpaper = value,
            KeybindingAction::PrevWallpaper => s.prev_wallpaper = value,
        });
    }

    // ------------------------------------------------------------------
    // Enum-keyed helpers for the boolean fields
    // ------------------------------------------------------------------

    /// Read one of the boolean fields by key. Returns `None` for keys that
    /// are not boolean-typed.
    pub fn bool_field(&self, key: ConfigKey) -> Option<bool> {
        let inner = self.inner.borrow();
        let s = &inner.settings;
        match key {
            ConfigKey::AutoRotate => Some(s.auto_rotate),
            ConfigKey::AutoStart => Some(s.auto_start),
            ConfigKey::IconPreview => Some(s.icon_preview),
            ConfigKey::IntegrateSystemMenu => Some(s.integrate_system_menu),
            ConfigKey::Notifications => Some(s.notifications),
            ConfigKey::Random => Some(s.random),
            ConfigKey::RememberProfileState => Some(s.remember_profile_state),
            ConfigKey::UpdateLockscreen => Some(s.update_lockscreen),
            _ => None,
        }
    }

    /// Write one of the boolean fields by key, dispatching to the typed
    /// setter. Non-boolean keys are rejected and logged.
    pub fn set_bool_field(&self, key: ConfigKey, value: bool) {
        match key {
            ConfigKey::AutoRotate => self.set_auto_rotate(value),
            ConfigKey::AutoStart => self.set_auto_start(value),
            ConfigKey::IconPreview => self.set_icon_preview(value),
            ConfigKey::IntegrateSystemMenu => self.set_integrate_system_menu(value),
            ConfigKey::Notifications => self.set_notifications(value),
            ConfigKey::Random => self.set_random(value),
            ConfigKey::RememberProfileState => self.set_remember_profile_state(value),
            ConfigKey::UpdateLockscreen => self.set_update_lockscreen(value),
            other => warn!(key = %other, "Rejected boolean write to non-boolean key"),
        }
    }
}

impl StoreInner {
    /// Write the document to disk. Failures are logged and do not roll back
    /// the in-memory value: in-process consistency wins, and the next
    /// accepted write retries the file.
    fn persist(&self) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            error!(path = %parent.display(), error = %e, "Failed to create settings directory");
            return;
        }

        match serde_json::to_string_pretty(&self.settings) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    error!(path = %self.path.display(), error = %e, "Failed to write settings");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize settings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::profile::ProfileEntry;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("settings.json")).unwrap()
    }

    fn counter(store: &ConfigStore, owner: u64, key: ConfigKey) -> Rc<Cell<u32>> {
        let hits = Rc::new(Cell::new(0));
        let hits_cb = Rc::clone(&hits);
        store.subscribe(
            OwnerId::from_raw(owner),
            key,
            Rc::new(RefCell::new(move |_: &ConfigKey| {
                hits_cb.set(hits_cb.get() + 1)
            })),
        );
        hits
    }

    #[test]
    fn test_interval_accepts_positive() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        for n in [1i64, 60, 84600] {
            store.set_interval(n);
            assert_eq!(i64::from(store.interval()), n);
        }
    }

    #[test]
    fn test_interval_rejects_non_positive() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.set_interval(120);

        let hits = counter(&store, 1, ConfigKey::Interval);
        store.set_interval(0);
        store.set_interval(-5);

        assert_eq!(store.interval(), 120);
        assert_eq!(hits.get(), 0, "rejected writes must not notify");
    }

    #[test]
    fn test_lockscreen_profile_normalizes_to_inherit() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.set_current_profile("work");

        store.set_lockscreen_profile("work");
        assert_eq!(store.lockscreen_profile(), "");

        store.set_lockscreen_profile("beach");
        assert_eq!(store.lockscreen_profile(), "beach");
    }

    #[test]
    fn test_profiles_whole_map_replace() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut profiles = ProfileMap::new();
        profiles.insert(
            "Work".to_string(),
            vec![ProfileEntry::new("/home/u/work", true)],
        );
        store.set_profiles(profiles);

        let read = store.profiles();
        assert_eq!(read.len(), 1);
        assert_eq!(read["Work"], vec![ProfileEntry::new("/home/u/work", true)]);

        store.set_profiles(ProfileMap::new());
        assert!(store.profiles().is_empty(), "empty map, not absent");
    }

    #[test]
    fn test_exactly_one_notification_per_set() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let interval_hits = counter(&store, 1, ConfigKey::Interval);
        let profile_hits = counter(&store, 1, ConfigKey::Profiles);

        store.set_interval(90);

        assert_eq!(interval_hits.get(), 1);
        assert_eq!(profile_hits.get(), 0, "unrelated keys must not be notified");
    }

    #[test]
    fn test_notification_delivered_before_set_returns() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let observed = Rc::new(Cell::new(0u32));
        let observed_cb = Rc::clone(&observed);
        let reader = store.clone();
        store.subscribe(
            OwnerId::from_raw(1),
            ConfigKey::Interval,
            Rc::new(RefCell::new(move |_: &ConfigKey| {
                // Freshly read value must already be visible mid-notification
                observed_cb.set(reader.interval());
            })),
        );

        store.set_interval(777);
        assert_eq!(observed.get(), 777);
    }

    #[test]
    fn test_subscribers_notified_in_subscription_order() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Rc::clone(&order);
            store.subscribe(
                OwnerId::from_raw(1),
                ConfigKey::Random,
                Rc::new(RefCell::new(move |_: &ConfigKey| {
                    order.borrow_mut().push(tag)
                })),
            );
        }

        store.set_random(false);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dispose_all_twice_then_set_fires_nothing() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let owner = OwnerId::from_raw(7);
        let hits = counter(&store, 7, ConfigKey::AutoRotate);

        store.dispose_all(owner);
        store.dispose_all(owner);

        assert_eq!(store.active_subscriptions(owner), 0);
        store.set_auto_rotate(false);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        {
            let store = ConfigStore::load(path.clone()).unwrap();
            store.set_interval(42);
            store.set_current_profile("beach");
            let mut profiles = ProfileMap::new();
            profiles.insert("beach".to_string(), vec![ProfileEntry::new("/tmp/b", false)]);
            store.set_profiles(profiles);
        }

        let reloaded = ConfigStore::load(path).unwrap();
        assert_eq!(reloaded.interval(), 42);
        assert_eq!(reloaded.current_profile(), "beach");
        assert_eq!(reloaded.profiles()["beach"][0].path, "/tmp/b");
    }

    #[test]
    fn test_missing_file_yields_defaults_and_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = ConfigStore::load(path.clone()).unwrap();

        assert_eq!(store.interval(), crate::constants::defaults::INTERVAL_SECONDS);
        assert!(path.exists());
    }

    #[test]
    fn test_keybinding_accessors() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert_eq!(store.keybinding(KeybindingAction::NextWallpaper), "");
        store.set_keybinding(KeybindingAction::NextWallpaper, "<Control><Alt>n");
        assert_eq!(
            store.keybinding(KeybindingAction::NextWallpaper),
            "<Control><Alt>n"
        );
    }

    #[test]
    fn test_bool_field_dispatch() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert_eq!(store.bool_field(ConfigKey::Random), Some(true));
        assert_eq!(store.bool_field(ConfigKey::Interval), None);

        store.set_bool_field(ConfigKey::Random, false);
        assert!(!store.random());

        // Non-boolean key: rejected, nothing changes
        store.set_bool_field(ConfigKey::Interval, true);
        assert_eq!(store.interval(), crate::constants::defaults::INTERVAL_SECONDS);
    }
}
