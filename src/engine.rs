//! Event-to-policy engine
//!
//! Feeds raw events to the key tracker, resolves the held chord and makes
//! the audio server match the resolved rule set.
//!
//! ```text
//!   key press/release ──▶ KeyTracker ──▶ Bindings::resolve
//!                                              │
//!            ┌─────────────────────────────────┼──────────────────────┐
//!            ▼                                 ▼                      ▼
//!       ReleaseAll                           Rule                  Unbound
//!   1. mute device                1. device volume = target      (no action)
//!   2. every stream → target      2. streams per rule set
//!                                 3. unmute device (last)
//! ```
//!
//! The device is unmuted only after every stream has its level, so a
//! half-applied rule is never audible. On release the device is muted
//! before streams are touched.

use crate::audio::AudioControl;
use crate::input::RawEvent;
use crate::rules::{classify, Bindings, Decision, Resolution, RuleSet};
use crate::tracker::{Chord, KeyAction, KeyTracker};
use std::fmt;
use std::sync::Arc;

/// Counts from one rule application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub apps: usize,
    pub allowed: usize,
    pub muted: usize,
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} apps | {} allowed | {} muted",
            self.apps, self.allowed, self.muted
        )
    }
}

/// What a reconcile cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No key held: device muted, streams restored
    Released { source: String, summary: ApplySummary },
    /// A bound chord was applied and the device unmuted
    Applied {
        chord: Chord,
        source: String,
        summary: ApplySummary,
    },
    /// Held keys have no binding; nothing changed
    Unbound(Chord),
    /// The default source could not be determined; cycle skipped
    NoSource,
}

/// Apply a rule set to every active capture stream
///
/// Every stream gets its level set, even when unchanged.
pub async fn apply_rules(control: &dyn AudioControl, rules: &RuleSet, volume: f32) -> ApplySummary {
    tracing::info!("=== Applying rules {} (volume {}) ===", rules, volume);

    let streams = control.list_capture_streams().await;
    if streams.is_empty() {
        tracing::info!("  No active apps using microphone");
        return ApplySummary::default();
    }

    let mut summary = ApplySummary::default();
    for item in classify(rules, &streams, volume) {
        tracing::info!(
            "  App #{}: '{}' (binary: {}) -> {} ({})",
            item.stream.index,
            item.stream.app_name,
            item.stream.binary,
            item.decision,
            item.level
        );
        control
            .set_stream_volume(&item.stream.index, item.level)
            .await;

        summary.apps += 1;
        match item.decision {
            Decision::Muted => summary.muted += 1,
            Decision::Allowed | Decision::AllowedByDefault => summary.allowed += 1,
        }
    }

    tracing::info!("  Summary: {}", summary);
    summary
}

/// Key tracker, bindings and audio control wired together
pub struct Engine {
    tracker: KeyTracker,
    bindings: Bindings,
    control: Arc<dyn AudioControl>,
    volume: f32,
}

impl Engine {
    /// Create an engine watching every key mentioned in `bindings`
    pub fn new(bindings: Bindings, control: Arc<dyn AudioControl>, volume: f32) -> Self {
        let tracker = KeyTracker::new(bindings.keys_of_interest());
        Self {
            tracker,
            bindings,
            control,
            volume,
        }
    }

    pub fn tracker(&self) -> &KeyTracker {
        &self.tracker
    }

    /// Handle one raw event
    ///
    /// Returns `None` when the tracker ignored the event. Every accepted
    /// press or release triggers exactly one reconcile, even if the held set
    /// did not change.
    pub async fn handle_event(&mut self, event: &RawEvent) -> Option<Outcome> {
        tracing::trace!(
            "Event from device {}: type={} code={} value={}",
            event.device,
            event.event_type,
            event.code,
            event.value
        );

        let transition = self.tracker.handle(event)?;
        match transition.action {
            KeyAction::Press => tracing::info!("KEY {} pressed", transition.key.to_uppercase()),
            KeyAction::Release => tracing::info!("KEY {} released", transition.key.to_uppercase()),
        }
        if !transition.changed {
            tracing::debug!("Held keys unchanged, re-applying current rule");
        }

        Some(self.reconcile().await)
    }

    /// Make the audio server match the currently held chord
    pub async fn reconcile(&self) -> Outcome {
        match self.bindings.resolve(self.tracker.held()) {
            Resolution::Unbound(chord) => {
                tracing::debug!("No binding for chord '{}', leaving state as is", chord);
                Outcome::Unbound(chord)
            }
            Resolution::ReleaseAll(rules) => {
                let Some(source) = self.current_source().await else {
                    return Outcome::NoSource;
                };
                self.control.set_mute(&source, true).await;
                let summary = apply_rules(self.control.as_ref(), &rules, self.volume).await;
                Outcome::Released { source, summary }
            }
            Resolution::Rule { chord, rules } => {
                let Some(source) = self.current_source().await else {
                    return Outcome::NoSource;
                };
                tracing::info!("Chord '{}' active", chord);
                self.control.set_volume(&source, self.volume).await;
                let summary = apply_rules(self.control.as_ref(), rules, self.volume).await;
                self.control.set_mute(&source, false).await;
                Outcome::Applied {
                    chord,
                    source,
                    summary,
                }
            }
        }
    }

    /// Queried every cycle: the user may switch microphones at any moment
    async fn current_source(&self) -> Option<String> {
        let source = self.control.default_source().await;
        if source.is_none() {
            tracing::warn!("No default source, skipping this cycle");
        }
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory::{AudioCall, MemoryControl};
    use crate::audio::CaptureStream;
    use crate::keys::{KEY_PRESS, KEY_RELEASE, KEY_REPEAT};
    use std::collections::BTreeMap;

    const F13: u16 = 183;
    const F15: u16 = 185;
    const A: u16 = 30;

    fn engine(control: Arc<MemoryControl>) -> Engine {
        let binds = BTreeMap::from([
            ("f13".to_string(), vec!["!all".to_string(), "vesktop".to_string()]),
            ("f13 f15".to_string(), vec!["all".to_string()]),
        ]);
        Engine::new(Bindings::from_config(&binds).unwrap(), control, 1.0)
    }

    fn control() -> Arc<MemoryControl> {
        Arc::new(MemoryControl::new(Some("mic")).with_streams(vec![
            CaptureStream::new("1", "Vesktop", "vesktop"),
            CaptureStream::new("2", "Firefox", "firefox"),
        ]))
    }

    #[tokio::test]
    async fn test_apply_rules_sets_every_stream() {
        let control = control();
        let rules = RuleSet::parse(&["!all", "vesktop"]).unwrap();
        let summary = apply_rules(control.as_ref(), &rules, 0.9).await;

        assert_eq!(
            summary,
            ApplySummary {
                apps: 2,
                allowed: 1,
                muted: 1
            }
        );
        assert_eq!(control.stream_volume("1"), Some(0.9));
        assert_eq!(control.stream_volume("2"), Some(0.0));
    }

    #[tokio::test]
    async fn test_apply_rules_without_streams() {
        let control = Arc::new(MemoryControl::new(Some("mic")));
        let summary = apply_rules(control.as_ref(), &RuleSet::release_all(), 1.0).await;
        assert_eq!(summary, ApplySummary::default());
        assert_eq!(control.calls(), vec![AudioCall::ListCaptureStreams]);
    }

    #[tokio::test]
    async fn test_ignored_events_make_no_calls() {
        let control = control();
        let mut engine = engine(control.clone());

        assert!(engine.handle_event(&RawEvent::key(A, KEY_PRESS)).await.is_none());
        assert!(engine.handle_event(&RawEvent::key(0x2ff, KEY_PRESS)).await.is_none());
        assert!(engine.handle_event(&RawEvent::key(F13, KEY_REPEAT)).await.is_none());
        assert!(control.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmute_is_last_call() {
        let control = control();
        let mut engine = engine(control.clone());

        engine.handle_event(&RawEvent::key(F13, KEY_PRESS)).await;
        let calls = control.calls();
        assert_eq!(
            calls.last(),
            Some(&AudioCall::SetMute {
                source: "mic".to_string(),
                muted: false
            })
        );
    }

    #[tokio::test]
    async fn test_release_mutes_before_touching_streams() {
        let control = control();
        let mut engine = engine(control.clone());

        engine.handle_event(&RawEvent::key(F13, KEY_PRESS)).await;
        control.clear_calls();
        engine.handle_event(&RawEvent::key(F13, KEY_RELEASE)).await;

        let calls = control.calls();
        assert_eq!(calls[0], AudioCall::DefaultSource);
        assert_eq!(
            calls[1],
            AudioCall::SetMute {
                source: "mic".to_string(),
                muted: true
            }
        );
        assert_eq!(calls[2], AudioCall::ListCaptureStreams);
    }

    #[tokio::test]
    async fn test_unbound_chord_takes_no_action() {
        let control = control();
        let mut engine = engine(control.clone());

        let outcome = engine.handle_event(&RawEvent::key(F15, KEY_PRESS)).await;
        assert_eq!(outcome, Some(Outcome::Unbound(Chord::parse("f15"))));
        assert!(control.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_default_source_skips_cycle() {
        let control = control();
        control.set_default_source(None);
        let mut engine = engine(control.clone());

        let outcome = engine.handle_event(&RawEvent::key(F13, KEY_PRESS)).await;
        assert_eq!(outcome, Some(Outcome::NoSource));
        assert_eq!(control.calls(), vec![AudioCall::DefaultSource]);
    }

    #[tokio::test]
    async fn test_release_without_default_source_skips_cycle() {
        let control = control();
        let mut engine = engine(control.clone());

        engine.handle_event(&RawEvent::key(F13, KEY_PRESS)).await;
        control.set_default_source(None);
        control.clear_calls();

        let outcome = engine.handle_event(&RawEvent::key(F13, KEY_RELEASE)).await;
        assert_eq!(outcome, Some(Outcome::NoSource));
        assert_eq!(control.calls(), vec![AudioCall::DefaultSource]);
        assert!(engine.tracker().is_idle());
    }

    #[tokio::test]
    async fn test_default_source_queried_every_cycle() {
        let control = control();
        let mut engine = engine(control.clone());

        engine.handle_event(&RawEvent::key(F13, KEY_PRESS)).await;
        control.set_default_source(Some("headset"));
        let outcome = engine.handle_event(&RawEvent::key(F13, KEY_RELEASE)).await;

        assert!(matches!(outcome, Some(Outcome::Released { ref source, .. }) if source == "headset"));
        assert_eq!(control.is_muted("headset"), Some(true));
    }
}
