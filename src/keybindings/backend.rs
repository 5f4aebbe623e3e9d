//! Global shortcut grabbing via evdev raw keyboard input
//!
//! The evdev backend monitors keyboard devices directly under /dev/input,
//! which requires 'input' group membership. Listener threads are started
//! lazily on the first grab and share the grab table with the applet
//! thread; presses are queued over a channel and dispatched on the applet
//! thread by `KeybindingManager::dispatch_pending`.

use anyhow::{Context, Result};
use evdev::{Device, EventType, KeyCode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use tracing::{debug, error, info, warn};

use crate::config::KeybindingAction;
use crate::constants::input;
use crate::keybindings::accelerator::Accelerator;

/// Where global shortcut grabs land. The applet talks to this trait so the
/// grab mechanism can be swapped out in tests.
pub trait ShortcutBackend {
    /// Reserve `accel` for `action`. A second grab for the same action
    /// replaces the previous one.
    fn grab(&mut self, action: KeybindingAction, accel: &Accelerator) -> Result<()>;

    /// Release the grab held for `action`. Releasing an action with no grab
    /// is a no-op.
    fn release(&mut self, action: KeybindingAction) -> Result<()>;
}

type GrabTable = Arc<Mutex<HashMap<KeybindingAction, Accelerator>>>;

/// Shortcut backend reading raw key events from evdev devices.
pub struct EvdevBackend {
    grabs: GrabTable,
    tx: Sender<KeybindingAction>,
    listeners_started: bool,
}

impl EvdevBackend {
    /// Create the backend plus the receiving end of its press queue.
    pub fn new() -> (Self, Receiver<KeybindingAction>) {
        let (tx, rx) = channel();
        (
            Self {
                grabs: Arc::new(Mutex::new(HashMap::new())),
                tx,
                listeners_started: false,
            },
            rx,
        )
    }

    fn ensure_listeners(&mut self) -> Result<()> {
        if self.listeners_started {
            return Ok(());
        }
        spawn_listeners(Arc::clone(&self.grabs), self.tx.clone())?;
        self.listeners_started = true;
        Ok(())
    }
}

impl ShortcutBackend for EvdevBackend {
    fn grab(&mut self, action: KeybindingAction, accel: &Accelerator) -> Result<()> {
        if accel.evdev_code().is_none() {
            anyhow::bail!("Accelerator '{}' has no evdev key code", accel);
        }
        self.ensure_listeners()?;
        self.grabs.lock().insert(action, accel.clone());
        info!(action = %action, accelerator = %accel, "Grabbed global shortcut");
        Ok(())
    }

    fn release(&mut self, action: KeybindingAction) -> Result<()> {
        if self.grabs.lock().remove(&action).is_some() {
            info!(action = %action, "Released global shortcut");
        }
        Ok(())
    }
}

/// Find all keyboard devices (devices that have a Tab key)
fn find_keyboard_devices() -> Result<Vec<(Device, std::path::PathBuf)>> {
    info!(path = %input::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(input::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        input::DEV_INPUT,
        input::INPUT_GROUP
    ))? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(device) = Device::open(&path)
            && let Some(keys) = device.supported_keys()
            && keys.contains(KeyCode(input::KEY_TAB))
        {
            info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
            devices.push((device, path));
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in the '{}' group, then log out and back in.",
            input::INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");

    Ok(devices)
}

fn spawn_listeners(grabs: GrabTable, tx: Sender<KeybindingAction>) -> Result<()> {
    let devices = find_keyboard_devices()?;

    for (device, device_path) in devices {
        let grabs = Arc::clone(&grabs);
        let tx = tx.clone();

        thread::spawn(move || {
            info!(device = ?device.name(), path = %device_path.display(), "Shortcut listener started");
            if let Err(e) = listen(device, grabs, tx) {
                error!(error = %e, "Shortcut listener error");
            }
        });
    }

    Ok(())
}

fn listen(mut device: Device, grabs: GrabTable, tx: Sender<KeybindingAction>) -> Result<()> {
    loop {
        let events = device.fetch_events().context("Failed to fetch events")?;

        // Finish with the iterator before querying key state
        let mut pressed_codes = Vec::new();
        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }
            debug!(key_code = event.code(), value = event.value(), "Key event");
            if event.value() == input::KEY_PRESS {
                pressed_codes.push(event.code());
            }
        }

        for key_code in pressed_codes {
            // Real-time modifier state avoids races from batched events
            let key_state = device
                .get_key_state()
                .context("Failed to get keyboard state")?;

            let ctrl = key_state.contains(KeyCode(29)) || key_state.contains(KeyCode(97));
            let shift = key_state.contains(KeyCode(input::KEY_LEFTSHIFT))
                || key_state.contains(KeyCode(input::KEY_RIGHTSHIFT));
            let alt = key_state.contains(KeyCode(56)) || key_state.contains(KeyCode(100));
            let super_key = key_state.contains(KeyCode(125)) || key_state.contains(KeyCode(126));

            let hit = grabs
                .lock()
                .iter()
                .find(|(_, accel)| accel.matches(key_code, ctrl, shift, alt, super_key))
                .map(|(action, _)| *action);

            if let Some(action) = hit {
                info!(action = %action, "Global shortcut pressed");
                tx.send(action).context("Failed to queue shortcut press")?;
            }
        }
    }
}

/// Check whether raw input devices are accessible at all.
pub fn check_permissions() -> bool {
    std::fs::read_dir(input::DEV_INPUT).is_ok()
}

pub fn print_permission_error() {
    error!(path = %input::DEV_INPUT, "Cannot access input devices");
    error!(group = %input::INPUT_GROUP, "Global shortcuts require group membership");
    warn!(continuing = true, "Continuing without global shortcut support...");
}

/// In-memory backend for tests: records grabs, never touches devices. The
/// grab table is shared so tests keep a handle after boxing the backend.
#[cfg(test)]
pub struct StubBackend {
    pub grabs: std::rc::Rc<std::cell::RefCell<HashMap<KeybindingAction, Accelerator>>>,
    pub fail_grabs: bool,
}

#[cfg(test)]
impl StubBackend {
    pub fn new() -> (Self, std::rc::Rc<std::cell::RefCell<HashMap<KeybindingAction, Accelerator>>>) {
        let grabs = std::rc::Rc::new(std::cell::RefCell::new(HashMap::new()));
        (
            Self {
                grabs: std::rc::Rc::clone(&grabs),
                fail_grabs: false,
            },
            grabs,
        )
    }
}

#[cfg(test)]
impl ShortcutBackend for StubBackend {
    fn grab(&mut self, action: KeybindingAction, accel: &Accelerator) -> Result<()> {
        if self.fail_grabs {
            anyhow::bail!("grab unavailable");
        }
        self.grabs.borrow_mut().insert(action, accel.clone());
        Ok(())
    }

    fn release(&mut self, action: KeybindingAction) -> Result<()> {
        self.grabs.borrow_mut().remove(&action);
        Ok(())
    }
}
