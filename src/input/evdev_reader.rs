//! evdev-based input source
//!
//! Opens every input device whose name matches the configuration and runs
//! one reader thread per device. Readers block in `fetch_events` until the
//! device has something to deliver and forward every raw event, unfiltered,
//! into a shared unbounded channel.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::{name_matches, DeviceForwarder, InputSource, RawEvent};
use crate::config::DeviceConfig;
use crate::error::InputError;
use evdev::Device;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A device picked for monitoring
struct OpenDevice {
    path: PathBuf,
    name: String,
    device: Device,
}

/// evdev-based input source over one or more devices
pub struct EvdevSource {
    /// Devices not yet handed to a reader thread
    devices: Vec<OpenDevice>,
    /// Names of all monitored devices
    names: Vec<String>,
    /// Tells reader threads to stop forwarding
    stop: Arc<AtomicBool>,
}

impl EvdevSource {
    /// Find and open the configured devices
    pub fn new(config: &DeviceConfig) -> Result<Self, InputError> {
        let devices = find_devices(config)?;

        for device in &devices {
            tracing::info!("Matched: '{}' -> {:?}", device.name, device.path);
        }

        Ok(Self {
            names: devices.iter().map(|d| d.name.clone()).collect(),
            devices,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait::async_trait]
impl InputSource for EvdevSource {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<RawEvent>, InputError> {
        let (tx, rx) = mpsc::unbounded_channel();

        for (index, open) in self.devices.drain(..).enumerate() {
            let tx = tx.clone();
            let stop = Arc::clone(&self.stop);
            let OpenDevice { path, name, device } = open;

            // A blocked read cannot be interrupted, so readers are plain
            // detached threads: they must not hold up runtime shutdown.
            std::thread::Builder::new()
                .name(format!("input-{}", index))
                .spawn(move || reader_loop(index, path, device, tx, stop))
                .map_err(|e| InputError::Evdev(format!("Failed to spawn reader for '{}': {}", name, e)))?;

            tracing::info!("Listening for keys from '{}'", name);
        }

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), InputError> {
        self.stop.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn device_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// Reader loop for a single device, running on its own thread
///
/// Keys the device still holds when the loop ends are released.
fn reader_loop(
    index: usize,
    path: PathBuf,
    mut device: Device,
    tx: mpsc::UnboundedSender<RawEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut forwarder = DeviceForwarder::new(index, tx);

    loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Input device {:?} stopped: {}", path, e);
                forwarder.close();
                return;
            }
        };

        for event in events {
            let raw = RawEvent {
                device: index,
                event_type: event.event_type().0,
                code: event.code(),
                value: event.value(),
            };

            if !forwarder.forward(raw) {
                tracing::debug!("Event queue closed, reader for {:?} exiting", path);
                return;
            }
        }

        if stop.load(Ordering::Relaxed) {
            tracing::debug!("Reader for {:?} stopping", path);
            forwarder.close();
            return;
        }
    }
}

/// All input devices with their names, for `micgate devices`
pub fn list_devices() -> Vec<(PathBuf, String)> {
    let mut devices: Vec<(PathBuf, String)> = evdev::enumerate()
        .map(|(path, device)| (path, device.name().unwrap_or("unknown").to_string()))
        .collect();
    devices.sort();
    devices
}

/// Open every device matching the configured names
fn find_devices(config: &DeviceConfig) -> Result<Vec<OpenDevice>, InputError> {
    let mut matched = Vec::new();
    let mut fallback = None;
    let mut seen = 0usize;

    for (path, device) in evdev::enumerate() {
        seen += 1;
        let name = device.name().unwrap_or("").to_string();
        tracing::debug!("Found input device {:?} ({:?})", path, name);

        if name_matches(&name, config) {
            matched.push(OpenDevice { path, name, device });
        } else if config.keyboard_fallback
            && fallback.is_none()
            && name.to_lowercase().contains("keyboard")
        {
            fallback = Some(OpenDevice { path, name, device });
        }
    }

    if !matched.is_empty() {
        return Ok(matched);
    }

    if let Some(device) = fallback {
        tracing::warn!(
            "No exact match. Falling back to first keyboard: '{}' -> {:?}",
            device.name,
            device.path
        );
        return Ok(vec![device]);
    }

    // enumerate() skips devices it cannot open, so seeing none at all
    // usually means missing permissions
    if seen == 0 {
        check_input_access()?;
    }

    Err(InputError::DeviceNotFound(describe_wanted(config)))
}

/// Fail with DeviceAccess if /dev/input has event nodes we cannot open
fn check_input_access() -> Result<(), InputError> {
    let entries = std::fs::read_dir("/dev/input")
        .map_err(|e| InputError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        if let Err(e) = Device::open(&path) {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                return Err(InputError::DeviceAccess(path.display().to_string()));
            }
            tracing::trace!("Skipping {:?}: {}", path, e);
        }
    }

    Ok(())
}

fn describe_wanted(config: &DeviceConfig) -> String {
    let names: Vec<String> = config.names.iter().map(|n| format!("'{}'", n)).collect();
    let mut wanted = if names.is_empty() {
        "no configured names".to_string()
    } else {
        names.join(", ")
    };
    if config.keyboard_fallback {
        wanted.push_str(" (fallback: *keyboard*)");
    }
    wanted
}
