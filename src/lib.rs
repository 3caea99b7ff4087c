//! micgate: chord-based push-to-talk for PipeWire/PulseAudio
//!
//! This library provides the core functionality for:
//! - Reading raw key events from one or more input devices via evdev
//! - Tracking which bound keys are held and turning them into a chord
//! - Resolving the chord to a rule set of allow/mute directives
//! - Applying the rule set per application through `pactl`, then opening
//!   or closing the microphone
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐  ┌──────────────┐        ┌──────────────┐
//!   │   Device 0   │  │   Device 1   │  ...   │   Device N   │
//!   │   (evdev)    │  │   (evdev)    │        │   (evdev)    │
//!   └──────────────┘  └──────────────┘        └──────────────┘
//!          │                 │                       │
//!          └─────────────────┼───────────────────────┘
//!                            ▼ raw events (unbounded mpsc)
//!                   ┌──────────────────┐
//!                   │    KeyTracker    │  held keys → chord
//!                   └──────────────────┘
//!                            │
//!                            ▼
//!                   ┌──────────────────┐
//!                   │     Bindings     │  chord → rule set / release-all
//!                   └──────────────────┘
//!                            │
//!                            ▼
//!                   ┌──────────────────┐
//!                   │    Classifier    │  stream → allowed / muted
//!                   └──────────────────┘
//!                            │
//!                            ▼
//!                   ┌──────────────────┐
//!                   │   AudioControl   │  pactl
//!                   └──────────────────┘
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod input;
pub mod keys;
pub mod rules;
pub mod setup;
pub mod tracker;

pub use cli::{Cli, Commands, SetupAction};
pub use config::Config;
pub use daemon::Daemon;
pub use engine::{Engine, Outcome};
pub use error::{MicgateError, Result};
