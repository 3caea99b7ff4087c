//! End-to-end chord scenarios against an in-memory audio server
//!
//! Raw key events go through the same engine the daemon drives; the
//! in-memory control records every call so ordering can be checked without
//! a running PipeWire/PulseAudio.

use micgate::audio::memory::{AudioCall, MemoryControl};
use micgate::audio::CaptureStream;
use micgate::engine::{ApplySummary, Engine, Outcome};
use micgate::input::RawEvent;
use micgate::keys::{EV_KEY, KEY_PRESS, KEY_RELEASE, KEY_REPEAT};
use micgate::rules::Bindings;
use micgate::tracker::Chord;
use std::collections::BTreeMap;
use std::sync::Arc;

const F13: u16 = 183;
const F15: u16 = 185;
const SPACE: u16 = 57;
const SOURCE: &str = "alsa_input.usb-Blue_Yeti";

fn bindings() -> Bindings {
    let binds = BTreeMap::from([
        (
            "f13".to_string(),
            vec!["!all".to_string(), "vesktop".to_string(), "discord".to_string()],
        ),
        ("f15".to_string(), vec!["!vesktop".to_string()]),
        ("f15 f13".to_string(), vec!["all".to_string()]),
    ]);
    Bindings::from_config(&binds).unwrap()
}

fn streams() -> Vec<CaptureStream> {
    vec![
        CaptureStream::new("1", "Vesktop", "vesktop"),
        CaptureStream::new("2", "Firefox", "firefox"),
    ]
}

fn setup() -> (Arc<MemoryControl>, Engine) {
    let control = Arc::new(MemoryControl::new(Some(SOURCE)).with_streams(streams()));
    let engine = Engine::new(bindings(), control.clone(), 1.0);
    (control, engine)
}

async fn press(engine: &mut Engine, code: u16) -> Option<Outcome> {
    engine.handle_event(&RawEvent::key(code, KEY_PRESS)).await
}

async fn release(engine: &mut Engine, code: u16) -> Option<Outcome> {
    engine.handle_event(&RawEvent::key(code, KEY_RELEASE)).await
}

fn mute_calls(control: &MemoryControl) -> Vec<bool> {
    control
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            AudioCall::SetMute { muted, .. } => Some(muted),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn scenario_single_key_allows_listed_apps_only() {
    let (control, mut engine) = setup();

    let outcome = press(&mut engine, F13).await;
    assert_eq!(
        outcome,
        Some(Outcome::Applied {
            chord: Chord::parse("f13"),
            source: SOURCE.to_string(),
            summary: ApplySummary {
                apps: 2,
                allowed: 1,
                muted: 1
            },
        })
    );

    assert_eq!(control.stream_volume("1"), Some(1.0));
    assert_eq!(control.stream_volume("2"), Some(0.0));
    assert_eq!(control.volume(SOURCE), Some(1.0));
    assert_eq!(control.is_muted(SOURCE), Some(false));

    let calls = control.calls();
    assert_eq!(calls.first(), Some(&AudioCall::DefaultSource));
    assert_eq!(
        calls.get(1),
        Some(&AudioCall::SetVolume {
            source: SOURCE.to_string(),
            level: 1.0
        })
    );
    assert_eq!(
        calls.last(),
        Some(&AudioCall::SetMute {
            source: SOURCE.to_string(),
            muted: false
        })
    );
}

#[tokio::test]
async fn scenario_two_key_chord_allows_everything() {
    let (control, mut engine) = setup();

    press(&mut engine, F13).await;
    assert_eq!(control.stream_volume("1"), Some(1.0));
    assert_eq!(control.stream_volume("2"), Some(0.0));

    // f13 then f15 resolves the canonical "f13 f15" chord
    let outcome = press(&mut engine, F15).await;
    assert!(matches!(
        outcome,
        Some(Outcome::Applied { ref chord, .. }) if chord.as_str() == "f13 f15"
    ));
    assert_eq!(control.stream_volume("1"), Some(1.0));
    assert_eq!(control.stream_volume("2"), Some(1.0));
    assert_eq!(control.is_muted(SOURCE), Some(false));
}

#[tokio::test]
async fn scenario_release_mutes_then_restores_streams() {
    let (control, mut engine) = setup();

    press(&mut engine, F13).await;
    control.clear_calls();

    let outcome = release(&mut engine, F13).await;
    assert!(matches!(outcome, Some(Outcome::Released { .. })));
    assert_eq!(control.is_muted(SOURCE), Some(true));
    assert_eq!(control.stream_volume("1"), Some(1.0));
    assert_eq!(control.stream_volume("2"), Some(1.0));

    // Mute comes straight after the source query, before any stream work
    let calls = control.calls();
    assert_eq!(
        &calls[..2],
        &[
            AudioCall::DefaultSource,
            AudioCall::SetMute {
                source: SOURCE.to_string(),
                muted: true
            }
        ]
    );
    assert!(!calls
        .iter()
        .any(|call| matches!(call, AudioCall::SetVolume { .. })));
}

#[tokio::test]
async fn scenario_partial_release_falls_back_to_remaining_chord() {
    let (control, mut engine) = setup();

    press(&mut engine, F13).await;
    press(&mut engine, F15).await;

    // f15 alone mutes vesktop only
    release(&mut engine, F13).await;
    assert_eq!(control.stream_volume("1"), Some(0.0));
    assert_eq!(control.stream_volume("2"), Some(1.0));
    assert_eq!(control.is_muted(SOURCE), Some(false));

    release(&mut engine, F15).await;
    assert_eq!(control.is_muted(SOURCE), Some(true));
    assert_eq!(mute_calls(&control), vec![false, false, false, true]);
}

#[tokio::test]
async fn scenario_unwatched_and_repeat_events_are_ignored() {
    let (control, mut engine) = setup();

    assert_eq!(press(&mut engine, SPACE).await, None);
    assert_eq!(
        engine
            .handle_event(&RawEvent::key(F13, KEY_REPEAT))
            .await,
        None
    );

    let sync = RawEvent {
        device: 0,
        event_type: 0,
        code: 0,
        value: 0,
    };
    assert_eq!(engine.handle_event(&sync).await, None);
    assert!(control.calls().is_empty());

    // A real key event still carries the EV_KEY type
    assert_eq!(RawEvent::key(F13, KEY_PRESS).event_type, EV_KEY);
}

#[tokio::test]
async fn scenario_repress_reapplies_rule() {
    let (control, mut engine) = setup();

    press(&mut engine, F13).await;
    // A new app starts recording while the key is held
    control.set_streams(vec![
        CaptureStream::new("1", "Vesktop", "vesktop"),
        CaptureStream::new("2", "Firefox", "firefox"),
        CaptureStream::new("3", "OBS", "obs"),
    ]);

    let outcome = press(&mut engine, F13).await;
    assert!(matches!(outcome, Some(Outcome::Applied { .. })));
    assert_eq!(control.stream_volume("3"), Some(0.0));
}

#[tokio::test]
async fn scenario_release_all_ignores_previous_chord() {
    let (control, mut engine) = setup();

    // A key released without ever being seen pressed still resolves to
    // the empty chord
    let outcome = release(&mut engine, F15).await;
    assert!(matches!(outcome, Some(Outcome::Released { .. })));
    assert_eq!(control.is_muted(SOURCE), Some(true));
    assert_eq!(control.stream_volume("1"), Some(1.0));
    assert_eq!(control.stream_volume("2"), Some(1.0));
}

#[tokio::test]
async fn scenario_devices_share_one_held_set() {
    let (control, mut engine) = setup();

    let mut from_pedal = RawEvent::key(F15, KEY_PRESS);
    from_pedal.device = 1;

    press(&mut engine, F13).await;
    engine.handle_event(&from_pedal).await;
    assert_eq!(control.stream_volume("2"), Some(1.0));

    let mut pedal_up = RawEvent::key(F15, KEY_RELEASE);
    pedal_up.device = 1;
    engine.handle_event(&pedal_up).await;
    assert_eq!(control.stream_volume("2"), Some(0.0));
    assert_eq!(control.is_muted(SOURCE), Some(false));
}
