//! Key names
//!
//! Chord bindings use lowercase key names derived from evdev's key
//! constants: `KEY_F13` → `"f13"`, `KEY_MICMUTE` → `"micmute"`, and button
//! codes keep their prefix, `BTN_SIDE` → `"btn_side"`. Every key the kernel
//! defines has a name; codes without one are ignored by the tracker rather
//! than treated as errors.

use crate::error::InputError;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Event type for key events
#[cfg(target_os = "linux")]
pub const EV_KEY: u16 = evdev::EventType::KEY.0;
#[cfg(not(target_os = "linux"))]
pub const EV_KEY: u16 = 0x01;

// evdev 0.12 exposes key values only as the raw i32 in `InputEvent::value`

/// Event value for a key release
pub const KEY_RELEASE: i32 = 0;
/// Event value for a key press
pub const KEY_PRESS: i32 = 1;
/// Event value for an autorepeat while the key is held
pub const KEY_REPEAT: i32 = 2;

/// Code → name for every named key, built once
fn names() -> &'static HashMap<u16, String> {
    static NAMES: OnceLock<HashMap<u16, String>> = OnceLock::new();
    NAMES.get_or_init(build_names)
}

#[cfg(target_os = "linux")]
fn build_names() -> HashMap<u16, String> {
    // KEY_CNT; code 0 is KEY_RESERVED
    (1..0x300u16)
        .filter_map(|code| {
            let name = format!("{:?}", evdev::Key::new(code));
            let name = match name.strip_prefix("KEY_") {
                Some(rest) => rest.to_ascii_lowercase(),
                None if name.starts_with("BTN_") => name.to_ascii_lowercase(),
                None => return None,
            };
            Some((code, name))
        })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn build_names() -> HashMap<u16, String> {
    HashMap::new()
}

#[cfg(target_os = "linux")]
fn lookup_code(normalized: &str) -> Option<u16> {
    let constant = if normalized.starts_with("btn_") {
        normalized.to_ascii_uppercase()
    } else {
        format!("KEY_{}", normalized.to_ascii_uppercase())
    };
    constant.parse::<evdev::Key>().ok().map(|key| key.code())
}

#[cfg(not(target_os = "linux"))]
fn lookup_code(_normalized: &str) -> Option<u16> {
    None
}

/// Look up the canonical name for a raw key code
pub fn key_name(code: u16) -> Option<&'static str> {
    names().get(&code).map(String::as_str)
}

/// Look up the raw key code for a key name
pub fn key_code(name: &str) -> Option<u16> {
    let normalized = name.trim().to_ascii_lowercase();
    let normalized = normalized.strip_prefix("key_").unwrap_or(&normalized);
    lookup_code(normalized)
}

/// Normalize a user-supplied key name to its canonical name
///
/// Accepts `F13`, `f13`, `KEY_F13` and `BTN_SIDE`. Aliases resolve to the
/// name the tracker reports for the same code.
pub fn parse_key_name(name: &str) -> Result<&'static str, InputError> {
    key_code(name)
        .and_then(key_name)
        .ok_or_else(|| InputError::UnknownKey(name.trim().to_string()))
}
