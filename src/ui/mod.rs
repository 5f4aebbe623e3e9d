//! Panel UI: reactive binding host, menu surfaces, daemon controls,
//! notifications

pub mod binding;
pub mod controls;
pub mod menu;
pub mod notify;

pub use binding::{AppContext, BindingHost};
pub use controls::{DaemonToggle, RotationControls, ToggleState};
pub use menu::{ProfileSubMenu, RotationSubMenu, SwitchItem};
pub use notify::{Notification, NotificationQueue, SettingsNotifier, Severity};
