//! Global shortcuts: accelerator parsing, evdev grabbing, slot management

pub mod accelerator;
pub mod backend;
pub mod manager;

pub use accelerator::Accelerator;
pub use backend::{EvdevBackend, ShortcutBackend};
pub use manager::{KeybindingManager, ShortcutNamespace};
