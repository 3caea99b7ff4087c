//! Key-state tracking
//!
//! Keeps the union of watched keys currently held across all monitored
//! devices and derives the canonical chord from it.
//!
//! ```text
//!   RawEvent ──▶ EV_KEY? ──▶ not repeat? ──▶ known code? ──▶ watched? ──▶ held set
//! ```
//!
//! Anything filtered out along the way produces no transition, so it never
//! reaches the resolver.

use crate::input::RawEvent;
use crate::keys::{self, EV_KEY, KEY_PRESS, KEY_RELEASE};
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Canonical chord identifier: held key names, sorted, joined by one space
///
/// The empty chord is reserved for "no key held" and always resolves to
/// the release-all rule set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Chord(String);

impl Chord {
    /// Build a chord from key names in any order
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Chord(sorted.into_iter().collect::<Vec<_>>().join(" "))
    }

    /// Parse a whitespace-separated chord string into canonical form
    pub fn parse(s: &str) -> Self {
        Self::from_keys(s.split_whitespace())
    }

    /// Whether this is the reserved empty chord
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key names making up the chord
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|k| !k.is_empty())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Borrow<str> for Chord {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Physical key action carried by an accepted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

/// An accepted press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: &'static str,
    pub action: KeyAction,
    /// Whether the held set actually changed (false for a re-press of a
    /// held key or a release of a key that was not held)
    pub changed: bool,
}

/// Tracks which watched keys are currently held
#[derive(Debug, Clone)]
pub struct KeyTracker {
    watched: HashSet<String>,
    held: BTreeSet<&'static str>,
}

impl KeyTracker {
    /// Create a tracker for the given keys of interest
    pub fn new<I, S>(watched: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            watched: watched.into_iter().map(Into::into).collect(),
            held: BTreeSet::new(),
        }
    }

    /// Feed one raw event
    ///
    /// Returns `Some` for every accepted press/release, including ones that
    /// leave the held set unchanged, so the caller re-applies the current
    /// rule whenever a key is reasserted.
    pub fn handle(&mut self, event: &RawEvent) -> Option<KeyTransition> {
        if event.event_type != EV_KEY {
            return None;
        }

        let action = match event.value {
            KEY_PRESS => KeyAction::Press,
            KEY_RELEASE => KeyAction::Release,
            // Autorepeat and anything unexpected
            _ => return None,
        };

        let key = keys::key_name(event.code)?;
        if !self.watched.contains(key) {
            return None;
        }

        let changed = match action {
            KeyAction::Press => self.held.insert(key),
            KeyAction::Release => self.held.remove(key),
        };

        Some(KeyTransition {
            key,
            action,
            changed,
        })
    }

    /// Keys currently held, sorted
    pub fn held(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.held.iter().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.held.is_empty()
    }

    /// Canonical chord for the held set
    pub fn chord(&self) -> Chord {
        Chord::from_keys(self.held.iter())
    }
}
