//! Chord bindings and capture stream classification
//!
//! A rule set is a list of directives bound to a chord:
//!
//! - `target` allows the matching applications (stream gain = target volume)
//! - `!target` mutes them (stream gain = 0.0)
//!
//! `target` is `all` or an application display/binary name, compared
//! case-insensitively. Classification is set membership rather than
//! first-match: allow membership is checked first, then mute membership,
//! and anything matching neither stays allowed. Directive order therefore
//! never changes the outcome.

use crate::audio::CaptureStream;
use crate::error::MicgateError;
use crate::tracker::Chord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Wildcard target matching every stream
pub const ALL: &str = "all";

/// Gain applied to muted streams
pub const MUTED_LEVEL: f32 = 0.0;

/// One allow or mute directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Allow(String),
    Mute(String),
}

impl Directive {
    /// Parse `target` or `!target`; the target is lowercased
    pub fn parse(s: &str) -> Result<Self, MicgateError> {
        let s = s.trim();
        let (mute, target) = match s.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, s),
        };

        if target.is_empty() {
            return Err(MicgateError::Config(format!(
                "Empty directive '{}': use an application name or 'all'",
                s
            )));
        }

        let target = target.to_lowercase();
        Ok(if mute {
            Directive::Mute(target)
        } else {
            Directive::Allow(target)
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Allow(target) => write!(f, "{}", target),
            Directive::Mute(target) => write!(f, "!{}", target),
        }
    }
}

/// Per-stream outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Matched an allow directive
    Allowed,
    /// Matched nothing; unmatched applications are never muted
    AllowedByDefault,
    /// Matched a mute directive and no allow directive
    Muted,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Decision::Muted)
    }

    /// Gain for this decision given the allow level
    pub fn level(self, allow_level: f32) -> f32 {
        if self.is_allowed() {
            allow_level
        } else {
            MUTED_LEVEL
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => write!(f, "ALLOWED"),
            Decision::AllowedByDefault => write!(f, "ALLOWED (default)"),
            Decision::Muted => write!(f, "MUTED"),
        }
    }
}

/// A classified stream with the gain to apply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classified {
    #[serde(flatten)]
    pub stream: CaptureStream,
    pub level: f32,
    pub decision: Decision,
}

/// An ordered list of directives with its allow/mute target sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    directives: Vec<Directive>,
    allowed: HashSet<String>,
    muted: HashSet<String>,
}

impl RuleSet {
    /// Parse a directive list such as `["!all", "vesktop"]`
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self, MicgateError> {
        let directives = items
            .iter()
            .map(|item| Directive::parse(item.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_directives(directives))
    }

    pub fn from_directives(directives: Vec<Directive>) -> Self {
        let mut allowed = HashSet::new();
        let mut muted = HashSet::new();
        for directive in &directives {
            match directive {
                Directive::Allow(target) => allowed.insert(target.clone()),
                Directive::Mute(target) => muted.insert(target.clone()),
            };
        }

        Self {
            directives,
            allowed,
            muted,
        }
    }

    /// The implicit rule set for the empty chord: allow everything
    pub fn release_all() -> Self {
        Self::from_directives(vec![Directive::Allow(ALL.to_string())])
    }

    /// Classify one stream
    pub fn decide(&self, stream: &CaptureStream) -> Decision {
        let app = stream.app_name.to_lowercase();
        let binary = stream.binary.to_lowercase();
        let matches = |targets: &HashSet<String>| {
            targets.contains(ALL) || targets.contains(&app) || targets.contains(&binary)
        };

        if matches(&self.allowed) {
            Decision::Allowed
        } else if matches(&self.muted) {
            Decision::Muted
        } else {
            Decision::AllowedByDefault
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.directives.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", items.join(", "))
    }
}

/// Classify every stream under a rule set
pub fn classify(rules: &RuleSet, streams: &[CaptureStream], allow_level: f32) -> Vec<Classified> {
    streams
        .iter()
        .map(|stream| {
            let decision = rules.decide(stream);
            Classified {
                stream: stream.clone(),
                level: decision.level(allow_level),
                decision,
            }
        })
        .collect()
}

/// What the held keys resolve to
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    /// No key held: mute the device and restore every stream
    ReleaseAll(RuleSet),
    /// A configured chord
    Rule { chord: Chord, rules: &'a RuleSet },
    /// Keys held but no binding for this exact chord: leave state alone
    Unbound(Chord),
}

/// Configured chord → rule set table
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    table: HashMap<Chord, RuleSet>,
}

impl Bindings {
    /// Build bindings from configuration entries
    ///
    /// Chords are canonicalized, so `"f15 f13"` binds the same chord as
    /// `"f13 f15"`. Unknown key names, empty chords, empty directives and
    /// two entries for the same chord are rejected.
    pub fn from_config(binds: &BTreeMap<String, Vec<String>>) -> Result<Self, MicgateError> {
        let mut table = HashMap::new();

        for (raw, directives) in binds {
            let keys = raw
                .split_whitespace()
                .map(crate::keys::parse_key_name)
                .collect::<Result<Vec<_>, _>>()?;
            let chord = Chord::from_keys(keys);

            if chord.is_empty() {
                return Err(MicgateError::Config(
                    "Empty chord in [binds]: the empty chord is reserved for release-all".to_string(),
                ));
            }

            let rules = RuleSet::parse(directives).map_err(|e| match e {
                MicgateError::Config(msg) => {
                    MicgateError::Config(format!("{} (chord '{}')", msg, raw))
                }
                other => other,
            })?;

            if table.insert(chord.clone(), rules).is_some() {
                return Err(MicgateError::Config(format!(
                    "Chord '{}' is bound more than once",
                    chord
                )));
            }
        }

        Ok(Self { table })
    }

    /// Union of every key mentioned in any chord
    pub fn keys_of_interest(&self) -> BTreeSet<String> {
        self.table
            .keys()
            .flat_map(|chord| chord.keys().map(str::to_string))
            .collect()
    }

    /// Resolve the held keys to a rule set
    pub fn resolve<I, S>(&self, held: I) -> Resolution<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_chord(Chord::from_keys(held))
    }

    /// Resolve an already canonical chord
    pub fn resolve_chord(&self, chord: Chord) -> Resolution<'_> {
        if chord.is_empty() {
            return Resolution::ReleaseAll(RuleSet::release_all());
        }

        match self.table.get(&chord) {
            Some(rules) => Resolution::Rule { chord, rules },
            None => Resolution::Unbound(chord),
        }
    }

    /// Configured chords with their rule sets, sorted by chord
    pub fn entries(&self) -> Vec<(&Chord, &RuleSet)> {
        let mut entries: Vec<(&Chord, &RuleSet)> = self.table.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
