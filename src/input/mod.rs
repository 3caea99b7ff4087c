//! Input device module
//!
//! On Linux, reads raw key events from one or more evdev devices at the
//! kernel level. This works on all Wayland compositors and X11 because it
//! operates below the display server.
//!
//! Every monitored device gets its own reader thread; all readers push into
//! one unbounded channel, so the consumer sees each device's events in
//! order and events across devices in arrival order.
//!
//! Linux: Requires the user to be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_reader;

use crate::config::DeviceConfig;
use crate::error::InputError;
use crate::keys::{EV_KEY, KEY_PRESS, KEY_RELEASE};
use std::collections::BTreeSet;
use tokio::sync::mpsc;

/// A raw event as delivered by an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Index of the device that produced the event
    pub device: usize,
    /// Event type (`EV_KEY`, `EV_SYN`, ...)
    pub event_type: u16,
    /// Event code (the key code for `EV_KEY`)
    pub code: u16,
    /// Event value (0 = release, 1 = press, 2 = repeat for `EV_KEY`)
    pub value: i32,
}

impl RawEvent {
    /// Build a key event for device 0
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            device: 0,
            event_type: crate::keys::EV_KEY,
            code,
            value,
        }
    }
}

/// One device's end of the shared event queue
///
/// Remembers which key codes the device currently holds. When the reader
/// stops while keys are down, `close` sends a release for each of them so
/// the shared held set does not keep a key from a device that is gone.
pub struct DeviceForwarder {
    device: usize,
    tx: mpsc::UnboundedSender<RawEvent>,
    pressed: BTreeSet<u16>,
}

impl DeviceForwarder {
    pub fn new(device: usize, tx: mpsc::UnboundedSender<RawEvent>) -> Self {
        Self {
            device,
            tx,
            pressed: BTreeSet::new(),
        }
    }

    /// Forward one event; returns false once the queue is closed
    pub fn forward(&mut self, event: RawEvent) -> bool {
        if event.event_type == EV_KEY {
            match event.value {
                KEY_PRESS => {
                    self.pressed.insert(event.code);
                }
                KEY_RELEASE => {
                    self.pressed.remove(&event.code);
                }
                _ => {}
            }
        }

        self.tx.send(event).is_ok()
    }

    /// Release every key still held, then drop this end of the queue
    pub fn close(self) {
        if self.pressed.is_empty() {
            return;
        }

        tracing::info!(
            "Device {} went away with {} key(s) held, releasing",
            self.device,
            self.pressed.len()
        );
        for &code in &self.pressed {
            let release = RawEvent {
                device: self.device,
                event_type: EV_KEY,
                code,
                value: KEY_RELEASE,
            };
            if self.tx.send(release).is_err() {
                return;
            }
        }
    }
}

/// Trait for input event sources
#[async_trait::async_trait]
pub trait InputSource: Send {
    /// Start reading from every device
    /// Returns the merged receiver for events from all devices
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<RawEvent>, InputError>;

    /// Stop forwarding events
    async fn stop(&mut self) -> Result<(), InputError>;

    /// Human-readable names of the monitored devices
    fn device_names(&self) -> Vec<String>;
}

/// Whether a device name matches one of the configured names
pub fn name_matches(device_name: &str, config: &DeviceConfig) -> bool {
    config.names.iter().any(|wanted| {
        if config.case_sensitive {
            device_name == wanted
        } else {
            device_name.to_lowercase() == wanted.to_lowercase()
        }
    })
}

/// Factory function to create the input source for the configured devices
///
/// Fails with `DeviceNotFound` when no device matches.
#[cfg(target_os = "linux")]
pub fn create_source(config: &DeviceConfig) -> Result<Box<dyn InputSource>, InputError> {
    Ok(Box::new(evdev_reader::EvdevSource::new(config)?))
}

/// Factory function to create the input source for the configured devices
///
/// Only Linux exposes evdev devices.
#[cfg(not(target_os = "linux"))]
pub fn create_source(_config: &DeviceConfig) -> Result<Box<dyn InputSource>, InputError> {
    Err(InputError::NotSupported(
        "Input devices are read through evdev, which is only available on Linux".to_string(),
    ))
}

/// All readable input devices as (path, name), sorted by path
#[cfg(target_os = "linux")]
pub fn list_devices() -> Vec<(std::path::PathBuf, String)> {
    evdev_reader::list_devices()
}

#[cfg(not(target_os = "linux"))]
pub fn list_devices() -> Vec<(std::path::PathBuf, String)> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(names: &[&str], case_sensitive: bool) -> DeviceConfig {
        DeviceConfig {
            names: names.iter().map(|n| n.to_string()).collect(),
            case_sensitive,
            keyboard_fallback: false,
        }
    }

    #[test]
    fn test_name_matches_case_insensitive() {
        let config = devices(&["gsr-ui virtual keyboard"], false);
        assert!(name_matches("gsr-ui virtual keyboard", &config));
        assert!(name_matches("GSR-UI Virtual Keyboard", &config));
        assert!(!name_matches("gsr-ui virtual keyboard 2", &config));
    }

    #[test]
    fn test_name_matches_case_sensitive() {
        let config = devices(&["Razer Naga"], true);
        assert!(name_matches("Razer Naga", &config));
        assert!(!name_matches("razer naga", &config));
    }

    fn on_device(device: usize, code: u16, value: i32) -> RawEvent {
        RawEvent {
            device,
            ..RawEvent::key(code, value)
        }
    }

    #[test]
    fn test_forwarder_releases_only_keys_still_down() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwarder = DeviceForwarder::new(1, tx);

        assert!(forwarder.forward(on_device(1, 183, KEY_PRESS)));
        assert!(forwarder.forward(on_device(1, 185, KEY_PRESS)));
        assert!(forwarder.forward(on_device(1, 183, crate::keys::KEY_REPEAT)));
        assert!(forwarder.forward(on_device(1, 185, KEY_RELEASE)));
        forwarder.close();

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 5);
        assert_eq!(received[4], on_device(1, 183, KEY_RELEASE));
    }

    #[test]
    fn test_forwarder_close_releases_held_keys() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwarder = DeviceForwarder::new(1, tx);

        forwarder.forward(on_device(1, 183, KEY_PRESS));
        forwarder.forward(on_device(1, 185, KEY_PRESS));
        forwarder.close();

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received[2..],
            [on_device(1, 183, KEY_RELEASE), on_device(1, 185, KEY_RELEASE)]
        );
        // The sender is gone with the forwarder
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forwarder_reports_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut forwarder = DeviceForwarder::new(0, tx);
        drop(rx);
        assert!(!forwarder.forward(RawEvent::key(183, KEY_PRESS)));
    }

    #[test]
    fn test_name_matches_any_configured() {
        let config = devices(&["Pedal", "Macro Pad"], false);
        assert!(name_matches("macro pad", &config));
        assert!(name_matches("pedal", &config));
        assert!(!name_matches("keyboard", &config));
    }
}
