//! Daemon control surfaces: the start/stop toggle and the next/prev row
//!
//! Commands are asynchronous, so these surfaces track in-flight
//! `RemoteCall` handles from their `tick` hook. State changes render from
//! the bridge's cached snapshot; command failures become user-facing
//! notifications without disturbing the rendered state.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

use crate::config::ConfigKey;
use crate::daemon::{RemoteCall, RemoteCallError};
use crate::ui::binding::{AppContext, ReactiveBinding};
use crate::ui::notify::{NotificationQueue, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Stopped,
    Running,
}

/// The start/stop switch for the rotation daemon.
pub struct DaemonToggle {
    pub state: ToggleState,
    pub last_error: Option<String>,
    in_flight: Option<RemoteCall>,
    queue: NotificationQueue,
}

impl DaemonToggle {
    pub fn new(queue: NotificationQueue) -> Self {
        Self {
            state: ToggleState::Stopped,
            last_error: None,
            in_flight: None,
            queue,
        }
    }

    /// Request the opposite of the current daemon state. One command in
    /// flight at a time; further toggles are dropped until it resolves.
    pub fn toggle(&mut self, ctx: &AppContext) {
        if self.in_flight.is_some() {
            warn!("Toggle ignored, previous command still in flight");
            return;
        }
        self.in_flight = Some(ctx.daemon.toggle());
    }
}

impl ReactiveBinding for DaemonToggle {
    fn watched_keys(&self) -> &[ConfigKey] {
        &[]
    }

    fn watches_daemon(&self) -> bool {
        true
    }

    fn render(&mut self, ctx: &AppContext) {
        self.state = if ctx.daemon.is_running() {
            ToggleState::Running
        } else {
            ToggleState::Stopped
        };
    }

    fn tick(&mut self, ctx: &AppContext) {
        let Some(call) = self.in_flight.as_ref() else {
            return;
        };
        let Some(result) = call.poll() else {
            return;
        };
        self.in_flight = None;
        match result {
            // The bridge already folded the new state into its snapshot
            Ok(()) => self.render(ctx),
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.queue.push(Severity::Error, e.to_string());
            }
        }
    }
}

/// Next/previous wallpaper controls. Fired from menu rows and from global
/// shortcuts, so the call list is shared via a cloneable handle.
pub struct RotationControls {
    calls: Rc<RefCell<Vec<RemoteCall>>>,
    queue: NotificationQueue,
}

impl RotationControls {
    pub fn new(queue: NotificationQueue) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            queue,
        }
    }

    /// Handle for pushing calls from outside the surface (shortcut
    /// handlers); resolved by this surface's tick.
    pub fn call_sink(&self) -> Rc<RefCell<Vec<RemoteCall>>> {
        Rc::clone(&self.calls)
    }

    pub fn next(&self, ctx: &AppContext) {
        self.calls.borrow_mut().push(ctx.daemon.next());
    }

    pub fn prev(&self, ctx: &AppContext) {
        self.calls.borrow_mut().push(ctx.daemon.prev());
    }
}

impl ReactiveBinding for RotationControls {
    fn watched_keys(&self) -> &[ConfigKey] {
        &[]
    }

    fn render(&mut self, _ctx: &AppContext) {}

    fn tick(&mut self, _ctx: &AppContext) {
        let mut calls = self.calls.borrow_mut();
        calls.retain(|call| match call.poll() {
            None => true,
            Some(Ok(())) => false,
            Some(Err(RemoteCallError::Detached)) => {
                // Shutdown path; not worth a notification
                false
            }
            Some(Err(e)) => {
                self.queue.push(Severity::Error, e.to_string());
                false
            }
        });
    }
}
