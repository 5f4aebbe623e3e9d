//! Accelerator string parsing and key code mapping
//!
//! Accelerators use the angle-bracket modifier notation shared with the rest
//! of the desktop shortcut registry, e.g. `<Control><Alt>n`. Parsing is
//! case-insensitive for modifier tokens; the trailing key name is kept
//! verbatim for display and normalized only when resolving the evdev code.

use evdev::KeyCode;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccelParseError {
    #[error("empty accelerator")]
    Empty,
    #[error("unterminated modifier token in '{0}'")]
    UnterminatedModifier(String),
    #[error("unknown modifier '<{0}>'")]
    UnknownModifier(String),
    #[error("missing key after modifiers in '{0}'")]
    MissingKey(String),
}

/// A parsed accelerator: modifier set plus one main key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accelerator {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub super_key: bool,
    pub key: String,
}

impl Accelerator {
    /// Resolve the main key to its evdev code, if the name is a key evdev
    /// knows (`n` resolves via `KEY_N`, `F5` via `KEY_F5`).
    pub fn evdev_code(&self) -> Option<u16> {
        let linux_name = format!("KEY_{}", self.key.to_uppercase());
        KeyCode::from_str(&linux_name).ok().map(|k| k.code())
    }

    /// Check a key press against this accelerator with the live modifier
    /// state of the device.
    pub fn matches(&self, key_code: u16, ctrl: bool, shift: bool, alt: bool, super_key: bool) -> bool {
        self.evdev_code() == Some(key_code)
            && self.ctrl == ctrl
            && self.shift == shift
            && self.alt == alt
            && self.super_key == super_key
    }
}

impl FromStr for Accelerator {
    type Err = AccelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AccelParseError::Empty);
        }

        let mut accel = Accelerator {
            ctrl: false,
            shift: false,
            alt: false,
            super_key: false,
            key: String::new(),
        };

        let mut rest = s;
        while let Some(stripped) = rest.strip_prefix('<') {
            let Some(end) = stripped.find('>') else {
                return Err(AccelParseError::UnterminatedModifier(s.to_string()));
            };
            let token = &stripped[..end];
            match token.to_ascii_lowercase().as_str() {
                "control" | "ctrl" | "primary" => accel.ctrl = true,
                "shift" => accel.shift = true,
                "alt" => accel.alt = true,
                "super" | "meta" => accel.super_key = true,
                _ => return Err(AccelParseError::UnknownModifier(token.to_string())),
            }
            rest = &stripped[end + 1..];
        }

        if rest.is_empty() {
            return Err(AccelParseError::MissingKey(s.to_string()));
        }

        accel.key = rest.to_string();
        Ok(accel)
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("<Control>")?;
        }
        if self.shift {
            f.write_str("<Shift>")?;
        }
        if self.alt {
            f.write_str("<Alt>")?;
        }
        if self.super_key {
            f.write_str("<Super>")?;
        }
        f.write_str(&self.key)
    }
}
