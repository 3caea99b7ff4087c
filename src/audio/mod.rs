//! Audio server control
//!
//! A narrow capability interface over the audio server: query the default
//! capture device, mute it, set its gain, enumerate per-application capture
//! streams and set each stream's gain.
//!
//! Every call is fire-and-forget from the caller's point of view. Control
//! failures are logged inside the implementation and surface as "nothing
//! happened" (`None`, an empty list, or simply returning), never as errors.

pub mod memory;
pub mod pactl;

use crate::config::AudioConfig;
use serde::Serialize;

/// Fallback binary name when a stream does not report one
pub const UNKNOWN_BINARY: &str = "unknown*";

/// A live per-application capture connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureStream {
    /// Server-assigned index (object serial)
    pub index: String,
    /// Application display name
    pub app_name: String,
    /// Application binary name, or `unknown*`
    pub binary: String,
}

impl CaptureStream {
    pub fn new(index: impl Into<String>, app_name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            app_name: app_name.into(),
            binary: binary.into(),
        }
    }
}

/// Trait for audio server control implementations
#[async_trait::async_trait]
pub trait AudioControl: Send + Sync {
    /// Current default capture device, or `None` when the query fails
    async fn default_source(&self) -> Option<String>;

    /// Mute or unmute a capture device
    async fn set_mute(&self, source: &str, muted: bool);

    /// Set a capture device's overall gain
    async fn set_volume(&self, source: &str, level: f32);

    /// Active capture streams
    ///
    /// Empty both when nothing is recording and when the query fails.
    async fn list_capture_streams(&self) -> Vec<CaptureStream>;

    /// Set one capture stream's gain
    async fn set_stream_volume(&self, index: &str, level: f32);

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Factory function to create the audio control for the configured program
pub fn create_control(config: &AudioConfig) -> Box<dyn AudioControl> {
    Box::new(pactl::PactlControl::new(&config.command))
}

/// Mute whatever is currently the default source
///
/// The source is queried fresh; returns the muted source, if any.
pub async fn mute_default_source(control: &dyn AudioControl) -> Option<String> {
    match control.default_source().await {
        Some(source) => {
            control.set_mute(&source, true).await;
            Some(source)
        }
        None => {
            tracing::warn!("No default source, cannot mute microphone");
            None
        }
    }
}

/// Format a gain level for the control program
///
/// Always includes a decimal point: `pactl` reads a bare integer as a raw
/// volume, so `1` would mean "almost silent" rather than 100%.
pub fn format_level(level: f32) -> String {
    if level.fract() == 0.0 {
        format!("{:.1}", level)
    } else {
        format!("{}", level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_level_keeps_decimal_point() {
        assert_eq!(format_level(1.0), "1.0");
        assert_eq!(format_level(0.0), "0.0");
        assert_eq!(format_level(2.0), "2.0");
        assert_eq!(format_level(0.75), "0.75");
    }

    #[tokio::test]
    async fn test_mute_default_source() {
        let control = memory::MemoryControl::new(Some("alsa_input.usb-mic"));
        let muted = mute_default_source(&control).await;
        assert_eq!(muted.as_deref(), Some("alsa_input.usb-mic"));
        assert_eq!(control.is_muted("alsa_input.usb-mic"), Some(true));
    }

    #[tokio::test]
    async fn test_mute_without_default_source_is_noop() {
        let control = memory::MemoryControl::new(None);
        assert!(mute_default_source(&control).await.is_none());
        assert_eq!(control.calls(), vec![memory::AudioCall::DefaultSource]);
    }
}
