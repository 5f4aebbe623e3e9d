//! Wire types shared between the applet and the rotation daemon

use ipc_channel::ipc::{IpcReceiver, IpcSender};
use serde::{Deserialize, Serialize};

/// Commands sent from the applet to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonCommand {
    /// Begin wallpaper rotation
    Start,
    /// Halt wallpaper rotation
    Stop,
    /// Advance to the next wallpaper
    Next,
    /// Return to the previous wallpaper
    Prev,
}

/// One command plus the sequence number its reply will carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub seq: u64,
    pub command: DaemonCommand,
}

/// Messages pushed from the daemon to the applet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonEvent {
    /// Rotation started or stopped, possibly on the daemon's own initiative
    Toggled(bool),
    /// The visible wallpaper changed to the given path
    Changed(String),
    /// The daemon hit a problem it could not recover from silently
    Error(String),
    /// Completion of the command with the matching sequence number
    Reply { seq: u64, result: Result<(), String> },
}

/// Daemon state captured at connection time, so a freshly attached applet
/// renders accurately before any event arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonSnapshot {
    pub running: bool,
    pub current_path: String,
    /// Whether the daemon is also driving the lockscreen background
    pub lockscreen: bool,
}

/// The bootstrap payload sent over the initial one-shot server channel:
/// the command channel into the daemon, the event channel out of it, and
/// the state snapshot taken when the daemon accepted the connection.
pub type BootstrapMessage = (
    IpcSender<CommandEnvelope>,
    IpcReceiver<DaemonEvent>,
    DaemonSnapshot,
);
