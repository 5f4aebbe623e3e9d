//! Application-wide constants
//!
//! Single source of truth for magic numbers and string literals used
//! throughout the applet.

/// Configuration paths and filenames
pub mod config {
    /// Application directory name under XDG config
    pub const APP_DIR: &str = "wallshift";

    /// Settings filename
    pub const FILENAME: &str = "settings.json";
}

/// Default configuration values
pub mod defaults {
    /// Rotation interval in seconds
    pub const INTERVAL_SECONDS: u32 = 300;

    /// Name of the profile present in a fresh configuration
    pub const PROFILE_NAME: &str = "default";

    /// Image types the daemon is allowed to rotate through
    pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];
}

/// Rotation daemon process and IPC settings
pub mod daemon {
    /// Binary name of the background rotation daemon
    pub const BINARY: &str = "wallshiftd";

    /// Flag used to hand the daemon its bootstrap IPC server name
    pub const IPC_SERVER_FLAG: &str = "--ipc-server";
}

/// Global shortcut registry shared with other desktop components
pub mod shortcuts {
    /// Directory holding one JSON file per external shortcut namespace
    pub const REGISTRY_DIR: &str = "/usr/share/wallshift/shortcuts";

    /// Fixed, pre-declared set of external namespaces checked for
    /// accelerator collisions
    pub const NAMESPACE_FILES: &[&str] = &[
        "window-manager.json",
        "compositor.json",
        "shell.json",
        "media-keys.json",
    ];
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key code for Tab key - used to identify keyboard devices
    pub const KEY_TAB: u16 = 15;

    /// Key code for Left Shift key
    pub const KEY_LEFTSHIFT: u16 = 42;

    /// Key code for Right Shift key
    pub const KEY_RIGHTSHIFT: u16 = 54;

    /// Input device directory
    pub const DEV_INPUT: &str = "/dev/input";

    /// Linux group required for raw input access
    pub const INPUT_GROUP: &str = "input";
}

/// Applet main loop settings
pub mod app {
    /// Sleep between main loop iterations in milliseconds
    pub const TICK_MS: u64 = 50;
}
