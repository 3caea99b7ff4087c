//! Configuration loading and types for micgate
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/micgate/config.toml)
//! 3. Environment variables (MICGATE_*)
//! 4. CLI arguments (highest priority)
//!
//! Everything is read once before the main loop starts; there is no reload.

use crate::error::MicgateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# micgate configuration
#
# Location: ~/.config/micgate/config.toml
# Hold a bound key combination to open the microphone for the listed
# applications; release every key to mute it again.

[audio]
# Volume applied to the microphone and to allowed applications (1.0 = 100%)
target_volume = 1.0

# Control program for PulseAudio / PipeWire (pipewire-pulse)
command = "pactl"

[devices]
# Input devices to read keys from (exact device names)
# List devices with: micgate devices
names = ["gsr-ui virtual keyboard"]

# Compare device names case-sensitively
case_sensitive = false

# If no device matches, use the first device whose name contains "keyboard"
keyboard_fallback = false

[binds]
# Key combination (space separated, any order) = directives
#   "app"   allow the application (display or binary name, case-insensitive)
#   "!app"  mute the application
#   "all"   wildcard for every application
# Allow beats mute; applications matching nothing stay allowed.
"f13" = ["!all", "vesktop", "gpu-screen-recorder"]
"f15" = ["!vesktop"]
"f13 f15" = ["all"]
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub devices: DeviceConfig,

    /// Chord → directives
    /// Example: { "f13 f15" = ["all"] }
    #[serde(default = "default_binds")]
    pub binds: BTreeMap<String, Vec<String>>,
}

/// Audio control configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Level for the microphone and for allowed streams (1.0 = 100%)
    #[serde(default = "default_target_volume")]
    pub target_volume: f32,

    /// Control program (pactl or a compatible wrapper)
    #[serde(default = "default_command")]
    pub command: String,
}

/// Input device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device names to monitor (exact match)
    #[serde(default = "default_device_names")]
    pub names: Vec<String>,

    /// Compare names case-sensitively
    #[serde(default)]
    pub case_sensitive: bool,

    /// Fall back to the first device named like a keyboard
    #[serde(default)]
    pub keyboard_fallback: bool,
}

fn default_target_volume() -> f32 {
    1.0
}

fn default_command() -> String {
    "pactl".to_string()
}

fn default_device_names() -> Vec<String> {
    vec!["gsr-ui virtual keyboard".to_string()]
}

fn default_binds() -> BTreeMap<String, Vec<String>> {
    let bind = |chord: &str, items: &[&str]| {
        (
            chord.to_string(),
            items.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    };

    BTreeMap::from([
        bind("f13", &["!all", "vesktop", "gpu-screen-recorder"]),
        bind("f15", &["!vesktop"]),
        bind("f13 f15", &["all"]),
    ])
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_volume: default_target_volume(),
            command: default_command(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            names: default_device_names(),
            case_sensitive: false,
            keyboard_fallback: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            devices: DeviceConfig::default(),
            binds: default_binds(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "micgate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (lock file)
    pub fn runtime_dir() -> PathBuf {
        // Use XDG_RUNTIME_DIR if available, otherwise fall back to /tmp
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("micgate")
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), MicgateError> {
        let volume = self.audio.target_volume;
        if !volume.is_finite() || volume < 0.0 {
            return Err(MicgateError::Config(format!(
                "target_volume must be a non-negative number, got {}",
                volume
            )));
        }

        if self.audio.command.trim().is_empty() {
            return Err(MicgateError::Config(
                "audio.command must not be empty".to_string(),
            ));
        }

        if self.devices.names.is_empty() && !self.devices.keyboard_fallback {
            return Err(MicgateError::Config(
                "devices.names is empty and keyboard_fallback is off: nothing to monitor"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, MicgateError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| MicgateError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| MicgateError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Override settings from MICGATE_* variables
fn apply_env_overrides<F>(config: &mut Config, var: F) -> Result<(), MicgateError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(volume) = var("MICGATE_VOLUME") {
        config.audio.target_volume = volume.trim().parse().map_err(|_| {
            MicgateError::Config(format!("MICGATE_VOLUME is not a number: '{}'", volume))
        })?;
    }
    if let Some(devices) = var("MICGATE_DEVICE") {
        config.devices.names = devices
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(command) = var("MICGATE_COMMAND") {
        config.audio.command = command;
    }

    Ok(())
}
