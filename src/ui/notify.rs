//! User-facing notifications for configuration and daemon activity
//!
//! Informational messages honor the notifications switch; error messages
//! always go through. The queue only collects, the applet loop decides how
//! to present what it drains.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::ConfigKey;
use crate::daemon::DaemonEvent;
use crate::ui::binding::{AppContext, ReactiveBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

/// Cloneable handle to the pending-notification queue.
#[derive(Clone)]
pub struct NotificationQueue {
    pending: Rc<RefCell<VecDeque<Notification>>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self {
            pending: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>) {
        self.pending.borrow_mut().push_back(Notification {
            severity,
            message: message.into(),
        });
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.pending.borrow_mut().drain(..).collect()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Surface translating state changes into notifications.
pub struct SettingsNotifier {
    queue: NotificationQueue,
    watch: [ConfigKey; 4],
}

impl SettingsNotifier {
    pub fn new(queue: NotificationQueue) -> Self {
        Self {
            queue,
            watch: [
                ConfigKey::CurrentProfile,
                ConfigKey::Notifications,
                ConfigKey::Random,
                ConfigKey::Rotation,
            ],
        }
    }

    fn info(&self, ctx: &AppContext, message: String) {
        if ctx.config.notifications() {
            self.queue.push(Severity::Info, message);
        }
    }
}

impl ReactiveBinding for SettingsNotifier {
    fn watched_keys(&self) -> &[ConfigKey] {
        &self.watch
    }

    fn watches_daemon(&self) -> bool {
        true
    }

    fn render(&mut self, _ctx: &AppContext) {}

    fn on_key_changed(&mut self, key: ConfigKey, ctx: &AppContext) {
        match key {
            ConfigKey::CurrentProfile => {
                self.info(
                    ctx,
                    format!("Profile changed to {}", ctx.config.current_profile()),
                );
            }
            // Announced regardless of the new value, so turning them off
            // still gets a confirmation
            ConfigKey::Notifications => {
                let state = if ctx.config.notifications() {
                    "enabled"
                } else {
                    "disabled"
                };
                self.queue
                    .push(Severity::Info, format!("Notifications {state}"));
            }
            ConfigKey::Random => {
                let order = if ctx.config.random() {
                    "random"
                } else {
                    "ordered"
                };
                self.info(ctx, format!("Wallpaper order changed to {order}"));
            }
            ConfigKey::Rotation => {
                use crate::config::Rotation;
                let mode = ctx.config.rotation();
                let message = match mode {
                    Rotation::Interval => {
                        format!("{} ({} seconds)", mode.label(), ctx.config.interval())
                    }
                    _ => mode.label().to_string(),
                };
                self.info(ctx, format!("Rotation mode changed to {message}"));
            }
            _ => {}
        }
    }

    fn on_daemon_event(&mut self, event: &DaemonEvent, ctx: &AppContext) {
        match event {
            DaemonEvent::Changed(path) => {
                self.info(ctx, format!("Wallpaper changed: {path}"));
            }
            DaemonEvent::Error(message) => {
                self.queue
                    .push(Severity::Error, format!("Daemon error: {message}"));
            }
            _ => {}
        }
    }
}
