//! Error types for micgate
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the micgate application
#[derive(Error, Debug)]
pub enum MicgateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Audio control error: {0}")]
    Audio(#[from] AudioError),

    #[error("Another micgate daemon is already running (lock: {0})")]
    AlreadyRunning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to input devices and key names
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Try f13-f24, micmute or btn_side, or run 'evtest' to find key names.")]
    UnknownKey(String),

    #[error("No input device matches {0}. List devices with: micgate devices")]
    DeviceNotFound(String),

    #[error("All input devices stopped delivering events")]
    AllDevicesClosed,

    #[error("{0}")]
    NotSupported(String),

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors raised by the audio server control program
///
/// These never leave `audio::pactl`: the `AudioControl` boundary logs them
/// and treats the call as a no-op.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("'{0}' not found in PATH. Install pulseaudio-utils (or pipewire-pulse).")]
    ProgramNotFound(String),

    #[error("Failed to run control program: {0}")]
    Spawn(String),

    #[error("Command failed: {command} ({status}){stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

impl MicgateError {
    /// Process exit status for a fatal error
    ///
    /// A missing input device exits with 2 so service managers and scripts
    /// can tell it apart from other failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            MicgateError::Input(InputError::DeviceNotFound(_)) => 2,
            _ => 1,
        }
    }
}

/// Result type alias using MicgateError
pub type Result<T> = std::result::Result<T, MicgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let missing: MicgateError = InputError::DeviceNotFound("'pedal'".to_string()).into();
        assert_eq!(missing.exit_code(), 2);

        let closed: MicgateError = InputError::AllDevicesClosed.into();
        assert_eq!(closed.exit_code(), 1);
        assert_eq!(MicgateError::Config("bad".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_device_not_found_message_points_to_devices_command() {
        let err = InputError::DeviceNotFound("'pedal'".to_string());
        assert!(err.to_string().contains("micgate devices"));
    }
}
