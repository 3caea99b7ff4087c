//! In-memory audio control for testing without an audio server.
//!
//! Records every call in order and keeps the resulting device and stream
//! state, so tests can assert both what was asked and where things ended up.
//!
//! # Example
//!
//! ```
//! use micgate::audio::memory::MemoryControl;
//! use micgate::audio::CaptureStream;
//!
//! let control = MemoryControl::new(Some("alsa_input.usb-mic"))
//!     .with_streams(vec![CaptureStream::new("1", "Vesktop", "vesktop")]);
//! assert!(control.calls().is_empty());
//! ```

use super::{AudioControl, CaptureStream};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A recorded control call
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    DefaultSource,
    SetMute { source: String, muted: bool },
    SetVolume { source: String, level: f32 },
    ListCaptureStreams,
    SetStreamVolume { index: String, level: f32 },
}

#[derive(Debug, Default)]
struct Inner {
    default_source: Option<String>,
    streams: Vec<CaptureStream>,
    muted: HashMap<String, bool>,
    volumes: HashMap<String, f32>,
    stream_volumes: HashMap<String, f32>,
    calls: Vec<AudioCall>,
}

/// Audio control backed by in-memory state
#[derive(Debug, Default)]
pub struct MemoryControl {
    inner: Mutex<Inner>,
}

impl MemoryControl {
    /// Creates a control whose default source is `source`
    pub fn new(source: Option<&str>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                default_source: source.map(str::to_string),
                ..Inner::default()
            }),
        }
    }

    /// Sets the capture streams reported by `list_capture_streams`
    pub fn with_streams(self, streams: Vec<CaptureStream>) -> Self {
        self.lock().streams = streams;
        self
    }

    /// Changes the default source, as a user switching microphones would
    pub fn set_default_source(&self, source: Option<&str>) {
        self.lock().default_source = source.map(str::to_string);
    }

    /// Replaces the active capture streams
    pub fn set_streams(&self, streams: Vec<CaptureStream>) {
        self.lock().streams = streams;
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<AudioCall> {
        self.lock().calls.clone()
    }

    /// Forgets recorded calls but keeps device and stream state
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Last mute state set on a source
    pub fn is_muted(&self, source: &str) -> Option<bool> {
        self.lock().muted.get(source).copied()
    }

    /// Last gain set on a source
    pub fn volume(&self, source: &str) -> Option<f32> {
        self.lock().volumes.get(source).copied()
    }

    /// Last gain set on a capture stream
    pub fn stream_volume(&self, index: &str) -> Option<f32> {
        self.lock().stream_volumes.get(index).copied()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl AudioControl for MemoryControl {
    async fn default_source(&self) -> Option<String> {
        let mut inner = self.lock();
        inner.calls.push(AudioCall::DefaultSource);
        inner.default_source.clone()
    }

    async fn set_mute(&self, source: &str, muted: bool) {
        let mut inner = self.lock();
        inner.calls.push(AudioCall::SetMute {
            source: source.to_string(),
            muted,
        });
        inner.muted.insert(source.to_string(), muted);
    }

    async fn set_volume(&self, source: &str, level: f32) {
        let mut inner = self.lock();
        inner.calls.push(AudioCall::SetVolume {
            source: source.to_string(),
            level,
        });
        inner.volumes.insert(source.to_string(), level);
    }

    async fn list_capture_streams(&self) -> Vec<CaptureStream> {
        let mut inner = self.lock();
        inner.calls.push(AudioCall::ListCaptureStreams);
        inner.streams.clone()
    }

    async fn set_stream_volume(&self, index: &str, level: f32) {
        let mut inner = self.lock();
        inner.calls.push(AudioCall::SetStreamVolume {
            index: index.to_string(),
            level,
        });
        inner.stream_volumes.insert(index.to_string(), level);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
