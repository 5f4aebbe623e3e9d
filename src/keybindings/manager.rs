//! Shortcut slot management with accelerator conflict detection
//!
//! Each shortcut slot stores one accelerator string in the settings
//! document. Before a new accelerator is persisted it is checked against
//! the applet's other slots and against the external shortcut namespaces
//! published by the rest of the desktop; a collision names its owner and
//! leaves the stored value untouched.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, KeybindingAction};
use crate::constants::shortcuts;
use crate::keybindings::accelerator::{AccelParseError, Accelerator};
use crate::keybindings::backend::ShortcutBackend;

/// One external namespace's shortcut value: either a single accelerator or
/// a list of alternates.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShortcutValue {
    Single(String),
    List(Vec<String>),
}

impl ShortcutValue {
    fn contains(&self, accel: &Accelerator) -> bool {
        let hit = |s: &str| Accelerator::from_str(s).is_ok_and(|a| a == *accel);
        match self {
            ShortcutValue::Single(s) => hit(s),
            ShortcutValue::List(list) => list.iter().any(|s| hit(s)),
        }
    }
}

/// Shortcuts registered by one external desktop component.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutNamespace {
    pub name: String,
    pub shortcuts: HashMap<String, ShortcutValue>,
}

impl ShortcutNamespace {
    /// Key of the first shortcut in this namespace bound to `accel`.
    pub fn find(&self, accel: &Accelerator) -> Option<&str> {
        self.shortcuts
            .iter()
            .find(|(_, value)| value.contains(accel))
            .map(|(key, _)| key.as_str())
    }

    /// Load the fixed set of system namespaces. Missing or malformed files
    /// are skipped with a log line so a partial registry still works.
    pub fn load_system() -> Vec<ShortcutNamespace> {
        Self::load_dir(Path::new(shortcuts::REGISTRY_DIR))
    }

    pub fn load_dir(dir: &Path) -> Vec<ShortcutNamespace> {
        let mut namespaces = Vec::new();

        for file in shortcuts::NAMESPACE_FILES {
            let path = dir.join(file);
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable shortcut namespace");
                    continue;
                }
            };
            match serde_json::from_str::<ShortcutNamespace>(&contents) {
                Ok(ns) => {
                    info!(namespace = %ns.name, count = ns.shortcuts.len(), "Loaded shortcut namespace");
                    namespaces.push(ns);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed shortcut namespace"),
            }
        }

        namespaces
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeybindingError {
    #[error("invalid accelerator: {0}")]
    Parse(#[from] AccelParseError),

    /// The accelerator is already claimed; `owner` names the holder, either
    /// `namespace/key` for an external shortcut or the applet's own slot.
    #[error("accelerator '{accelerator}' already bound by {owner}")]
    Conflict { owner: String, accelerator: String },
}

type Handler = Rc<dyn Fn()>;

/// Owns the applet's shortcut slots: registration, conflict-checked
/// accelerator writes, and dispatch of queued presses.
pub struct KeybindingManager {
    store: ConfigStore,
    backend: Box<dyn ShortcutBackend>,
    namespaces: Vec<ShortcutNamespace>,
    handlers: HashMap<KeybindingAction, Handler>,
    events: Receiver<KeybindingAction>,
}

impl KeybindingManager {
    pub fn new(
        store: ConfigStore,
        backend: Box<dyn ShortcutBackend>,
        namespaces: Vec<ShortcutNamespace>,
        events: Receiver<KeybindingAction>,
    ) -> Self {
        Self {
            store,
            backend,
            namespaces,
            handlers: HashMap::new(),
            events,
        }
    }

    /// Attach `handler` to `action` and grab its stored accelerator, if any.
    /// A grab failure keeps the slot registered; the handler still fires if
    /// the backend recovers later.
    pub fn register(&mut self, action: KeybindingAction, handler: Handler) {
        self.handlers.insert(action, handler);

        let stored = self.store.keybinding(action);
        if stored.is_empty() {
            return;
        }
        match Accelerator::from_str(&stored) {
            Ok(accel) => {
                if let Err(e) = self.backend.grab(action, &accel) {
                    warn!(action = %action, error = %e, "Failed to grab stored accelerator");
                }
            }
            Err(e) => warn!(action = %action, value = %stored, error = %e, "Stored accelerator does not parse"),
        }
    }

    /// Detach `action`: release the grab and drop the handler. Idempotent.
    pub fn unregister(&mut self, action: KeybindingAction) {
        self.handlers.remove(&action);
        if let Err(e) = self.backend.release(action) {
            warn!(action = %action, error = %e, "Failed to release shortcut grab");
        }
    }

    pub fn unregister_all(&mut self) {
        for action in KeybindingAction::ALL {
            self.unregister(action);
        }
    }

    /// Rebind `action` to `value` after conflict checking.
    ///
    /// The empty string always succeeds and clears the slot. A non-empty
    /// value is checked against the applet's other slots first, then every
    /// external namespace; on collision nothing is written or regrabbed and
    /// the error names the conflicting owner.
    pub fn set_accelerator(
        &mut self,
        action: KeybindingAction,
        value: &str,
    ) -> Result<(), KeybindingError> {
        if value.is_empty() {
            self.store.set_keybinding(action, "");
            if let Err(e) = self.backend.release(action) {
                warn!(action = %action, error = %e, "Failed to release shortcut grab");
            }
            return Ok(());
        }

        let accel = Accelerator::from_str(value)?;

        for other in KeybindingAction::ALL {
            if other == action {
                continue;
            }
            let stored = self.store.keybinding(other);
            if !stored.is_empty()
                && let Ok(other_accel) = Accelerator::from_str(&stored)
                && other_accel == accel
            {
                return Err(KeybindingError::Conflict {
                    owner: other.name().to_string(),
                    accelerator: accel.to_string(),
                });
            }
        }

        for ns in &self.namespaces {
            if let Some(key) = ns.find(&accel) {
                return Err(KeybindingError::Conflict {
                    owner: format!("{}/{}", ns.name, key),
                    accelerator: accel.to_string(),
                });
            }
        }

        self.store.set_keybinding(action, value);
        if self.handlers.contains_key(&action)
            && let Err(e) = self.backend.grab(action, &accel)
        {
            warn!(action = %action, error = %e, "Failed to grab new accelerator");
        }
        Ok(())
    }

    /// Drain queued presses and run their handlers on the calling thread.
    pub fn dispatch_pending(&mut self) {
        loop {
            let action = match self.events.try_recv() {
                Ok(action) => action,
                Err(_) => break,
            };
            if let Some(handler) = self.handlers.get(&action) {
                Rc::clone(handler)();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keybindings::backend::StubBackend;
    use std::cell::Cell;
    use std::sync::mpsc::channel;
    use tempfile::TempDir;

    fn test_namespaces() -> Vec<ShortcutNamespace> {
        let json = r#"{
            "name": "media-keys",
            "shortcuts": {
                "volume-up": "<Control>Up",
                "screenshot": ["<Shift>F12", "<Control><Shift>s"]
            }
        }"#;
        vec![serde_json::from_str(json).unwrap()]
    }

    fn test_manager(dir: &TempDir) -> (KeybindingManager, ConfigStore) {
        let store = ConfigStore::load(dir.path().join("settings.json")).unwrap();
        let (backend, _grabs) = StubBackend::new();
        let (_tx, rx) = channel();
        let manager =
            KeybindingManager::new(store.clone(), Box::new(backend), test_namespaces(), rx);
        (manager, store)
    }

    #[test]
    fn test_set_accelerator_persists() {
        let dir = TempDir::new().unwrap();
        let (mut manager, store) = test_manager(&dir);

        manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Control><Alt>n")
            .unwrap();
        assert_eq!(
            store.keybinding(KeybindingAction::NextWallpaper),
            "<Control><Alt>n"
        );
    }

    #[test]
    fn test_conflict_with_own_other_slot() {
        let dir = TempDir::new().unwrap();
        let (mut manager, store) = test_manager(&dir);

        manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Control><Alt>n")
            .unwrap();
        let err = manager
            .set_accelerator(KeybindingAction::PrevWallpaper, "<Control><Alt>n")
            .unwrap_err();

        assert_eq!(
            err,
            KeybindingError::Conflict {
                owner: "next-wallpaper".to_string(),
                accelerator: "<Control><Alt>n".to_string(),
            }
        );
        assert_eq!(store.keybinding(KeybindingAction::PrevWallpaper), "");
    }

    #[test]
    fn test_conflict_with_namespace_single_value() {
        let dir = TempDir::new().unwrap();
        let (mut manager, _store) = test_manager(&dir);

        let err = manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Control>Up")
            .unwrap_err();
        assert_eq!(
            err,
            KeybindingError::Conflict {
                owner: "media-keys/volume-up".to_string(),
                accelerator: "<Control>Up".to_string(),
            }
        );
    }

    #[test]
    fn test_conflict_with_namespace_list_value() {
        let dir = TempDir::new().unwrap();
        let (mut manager, store) = test_manager(&dir);

        // Second alternate in the list still collides
        let err = manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Control><Shift>s")
            .unwrap_err();
        assert!(matches!(err, KeybindingError::Conflict { owner, .. } if owner == "media-keys/screenshot"));
        assert_eq!(store.keybinding(KeybindingAction::NextWallpaper), "");
    }

    #[test]
    fn test_clearing_always_succeeds() {
        let dir = TempDir::new().unwrap();
        let (mut manager, store) = test_manager(&dir);

        manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Control><Alt>n")
            .unwrap();
        manager
            .set_accelerator(KeybindingAction::NextWallpaper, "")
            .unwrap();
        assert_eq!(store.keybinding(KeybindingAction::NextWallpaper), "");
    }

    #[test]
    fn test_invalid_accelerator_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut manager, store) = test_manager(&dir);

        let err = manager
            .set_accelerator(KeybindingAction::NextWallpaper, "<Bogus>n")
            .unwrap_err();
        assert!(matches!(err, KeybindingError::Parse(_)));
        assert_eq!(store.keybinding(KeybindingAction::NextWallpaper), "");
    }

    #[test]
    fn test_register_grabs_stored_accelerator() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::load(dir.path().join("settings.json")).unwrap();
        store.set_keybinding(KeybindingAction::NextWallpaper, "<Control><Alt>n");

        let (backend, grabs) = StubBackend::new();
        let (_tx, rx) = channel();
        let mut manager =
            KeybindingManager::new(store, Box::new(backend), test_namespaces(), rx);
        manager.register(KeybindingAction::NextWallpaper, Rc::new(|| {}));

        assert!(grabs.borrow().contains_key(&KeybindingAction::NextWallpaper));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::load(dir.path().join("settings.json")).unwrap();
        store.set_keybinding(KeybindingAction::NextWallpaper, "<Control><Alt>n");

        let (backend, grabs) = StubBackend::new();
        let (_tx, rx) = channel();
        let mut manager =
            KeybindingManager::new(store, Box::new(backend), test_namespaces(), rx);
        manager.register(KeybindingAction::NextWallpaper, Rc::new(|| {}));

        manager.unregister(KeybindingAction::NextWallpaper);
        manager.unregister(KeybindingAction::NextWallpaper);

        assert!(grabs.borrow().is_empty());
    }

    #[test]
    fn test_dispatch_pending_runs_handlers() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::load(dir.path().join("settings.json")).unwrap();
        let (backend, _grabs) = StubBackend::new();
        let (tx, rx) = channel();
        let mut manager =
            KeybindingManager::new(store, Box::new(backend), test_namespaces(), rx);

        let hits = Rc::new(Cell::new(0));
        let hits_cb = Rc::clone(&hits);
        manager.register(
            KeybindingAction::NextWallpaper,
            Rc::new(move || hits_cb.set(hits_cb.get() + 1)),
        );

        tx.send(KeybindingAction::NextWallpaper).unwrap();
        tx.send(KeybindingAction::NextWallpaper).unwrap();
        tx.send(KeybindingAction::PrevWallpaper).unwrap();
        manager.dispatch_pending();

        assert_eq!(hits.get(), 2, "unregistered slot presses are dropped");
    }

    #[test]
    fn test_namespace_load_dir_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("shell.json"),
            r#"{"name": "shell", "shortcuts": {"overview": "<Super>s"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("compositor.json"), "not json").unwrap();

        let namespaces = ShortcutNamespace::load_dir(dir.path());
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].name, "shell");
    }
}
