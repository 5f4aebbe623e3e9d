//! Panel menu surfaces: toggles, profile selectors, rotation mode
//!
//! Each surface keeps a plain view-model the panel renders from. Profile
//! submenus rebuild their item list whenever the profile map or their
//! selection key changes; the selected marker is recomputed for every
//! item on each rebuild, so renames and removals never leave a stale dot.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

use crate::config::{ConfigKey, Rotation};
use crate::ui::binding::{AppContext, ReactiveBinding};

/// A labelled on/off menu row mirroring one boolean configuration key.
pub struct SwitchItem {
    pub label: &'static str,
    key: ConfigKey,
    pub checked: bool,
    watch: [ConfigKey; 1],
}

impl SwitchItem {
    pub fn new(label: &'static str, key: ConfigKey) -> Self {
        Self {
            label,
            key,
            checked: false,
            watch: [key],
        }
    }

    /// Flip the underlying key. The re-render arrives through the store
    /// notification, same as for an external write; the write happens with
    /// the surface borrow released so that re-render can reach it.
    pub fn toggle(this: &Rc<RefCell<Self>>, ctx: &AppContext) {
        let key = this.borrow().key;
        match ctx.config.bool_field(key) {
            Some(current) => ctx.config.set_bool_field(key, !current),
            None => warn!(key = %key, "Switch item bound to non-boolean key"),
        }
    }
}

impl ReactiveBinding for SwitchItem {
    fn watched_keys(&self) -> &[ConfigKey] {
        &self.watch
    }

    fn render(&mut self, ctx: &AppContext) {
        self.checked = ctx.config.bool_field(self.key).unwrap_or(false);
    }
}

/// One row of a profile submenu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileItem {
    pub label: String,
    /// Value written on activation. Empty means "inherit from desktop".
    pub value: String,
    pub selected: bool,
}

/// Which selection key a profile submenu drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileTarget {
    Desktop,
    Lockscreen,
}

/// Submenu listing every profile, with a dot on the active one.
pub struct ProfileSubMenu {
    target: ProfileTarget,
    pub title: String,
    pub items: Vec<ProfileItem>,
    watch: Vec<ConfigKey>,
}

impl ProfileSubMenu {
    pub fn desktop() -> Self {
        Self {
            target: ProfileTarget::Desktop,
            title: String::new(),
            items: Vec::new(),
            watch: vec![ConfigKey::Profiles, ConfigKey::CurrentProfile],
        }
    }

    /// The lockscreen variant also watches the desktop selection: the
    /// inherit row's meaning and the title both depend on it.
    pub fn lockscreen() -> Self {
        Self {
            target: ProfileTarget::Lockscreen,
            title: String::new(),
            items: Vec::new(),
            watch: vec![
                ConfigKey::Profiles,
                ConfigKey::LockscreenProfile,
                ConfigKey::CurrentProfile,
            ],
        }
    }

    /// Write the selection for the item at `index`. The surface borrow is
    /// released before the write so the notification can re-render it.
    pub fn activate(this: &Rc<RefCell<Self>>, index: usize, ctx: &AppContext) {
        let selection = {
            let menu = this.borrow();
            menu.items.get(index).map(|i| (menu.target, i.value.clone()))
        };
        let Some((target, value)) = selection else {
            return;
        };
        match target {
            ProfileTarget::Desktop => ctx.config.set_current_profile(&value),
            ProfileTarget::Lockscreen => ctx.config.set_lockscreen_profile(&value),
        }
    }
}

impl ReactiveBinding for ProfileSubMenu {
    fn watched_keys(&self) -> &[ConfigKey] {
        &self.watch
    }

    fn render(&mut self, ctx: &AppContext) {
        let profiles = ctx.config.profiles();
        let desktop = ctx.config.current_profile();

        self.items.clear();

        match self.target {
            ProfileTarget::Desktop => {
                self.title = format!("Desktop Profile: {desktop}");
                for name in profiles.keys() {
                    self.items.push(ProfileItem {
                        label: name.clone(),
                        value: name.clone(),
                        selected: *name == desktop,
                    });
                }
            }
            ProfileTarget::Lockscreen => {
                let stored = ctx.config.lockscreen_profile();
                let inherited = stored.is_empty() || stored == desktop;
                self.title = if inherited {
                    "Lockscreen Profile: (inherited)".to_string()
                } else {
                    format!("Lockscreen Profile: {stored}")
                };

                self.items.push(ProfileItem {
                    label: "(inherit from desktop)".to_string(),
                    value: String::new(),
                    selected: inherited,
                });
                for name in profiles.keys() {
                    self.items.push(ProfileItem {
                        label: name.clone(),
                        value: name.clone(),
                        selected: !inherited && *name == stored,
                    });
                }
            }
        }
    }
}

/// Submenu choosing between the rotation modes.
pub struct RotationSubMenu {
    pub items: Vec<(Rotation, bool)>,
    watch: [ConfigKey; 1],
}

impl RotationSubMenu {
    const MODES: [Rotation; 3] = [Rotation::Interval, Rotation::Hourly, Rotation::Disabled];

    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            watch: [ConfigKey::Rotation],
        }
    }

    pub fn activate(this: &Rc<RefCell<Self>>, index: usize, ctx: &AppContext) {
        let mode = this.borrow().items.get(index).map(|(mode, _)| *mode);
        if let Some(mode) = mode {
            ctx.config.set_rotation(mode);
        }
    }
}

impl ReactiveBinding for RotationSubMenu {
    fn watched_keys(&self) -> &[ConfigKey] {
        &self.watch
    }

    fn render(&mut self, ctx: &AppContext) {
        let current = ctx.config.rotation();
        self.items = Self::MODES
            .iter()
            .map(|mode| (*mode, *mode == current))
            .collect();
    }
}

impl Default for RotationSubMenu {
    fn default() -> Self {
        Self::new()
    }
}
