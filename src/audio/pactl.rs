//! pactl-based audio control
//!
//! Drives PulseAudio, or PipeWire through pipewire-pulse, with the `pactl`
//! command line tool:
//!
//! | Operation          | Command                                           |
//! |--------------------|---------------------------------------------------|
//! | default source     | `pactl get-default-source`                        |
//! | mute / unmute      | `pactl set-source-mute <source> 1\|0`             |
//! | device gain        | `pactl set-source-volume <source> <level>`        |
//! | list streams       | `pactl list source-outputs`                       |
//! | stream gain        | `pactl set-source-output-volume <index> <level>`  |
//!
//! Commands run with `LC_ALL=C` so record headers are not translated.

use super::{format_level, AudioControl, CaptureStream, UNKNOWN_BINARY};
use crate::error::AudioError;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;

/// Header token that starts every record in `pactl list source-outputs`
const RECORD_HEADER: &str = "Source Output";

const INDEX_KEY: &str = "object.serial";
const NAME_KEY: &str = "application.name";
const BINARY_KEY: &str = "application.process.binary";

/// pactl-based audio control
pub struct PactlControl {
    /// Program to run (usually "pactl")
    program: String,
}

impl PactlControl {
    /// Create a new pactl control using the given program
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Run the control program and return its trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, AudioError> {
        tracing::trace!("Running: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AudioError::ProgramNotFound(self.program.clone())
                } else {
                    AudioError::Spawn(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(AudioError::CommandFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a command, logging and swallowing any failure
    async fn run_logged(&self, args: &[&str]) -> Option<String> {
        match self.run(args).await {
            Ok(stdout) => Some(stdout),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl AudioControl for PactlControl {
    async fn default_source(&self) -> Option<String> {
        self.run_logged(&["get-default-source"])
            .await
            .filter(|source| !source.is_empty())
    }

    async fn set_mute(&self, source: &str, muted: bool) {
        tracing::info!(
            "{} mic: {}",
            if muted { "Muting" } else { "Unmuting" },
            source
        );
        self.run_logged(&["set-source-mute", source, if muted { "1" } else { "0" }])
            .await;
    }

    async fn set_volume(&self, source: &str, level: f32) {
        let level = format_level(level);
        tracing::info!("Setting source volume for {} to {}", source, level);
        self.run_logged(&["set-source-volume", source, &level]).await;
    }

    async fn list_capture_streams(&self) -> Vec<CaptureStream> {
        match self.run_logged(&["list", "source-outputs"]).await {
            Some(output) => parse_source_outputs(&output),
            None => Vec::new(),
        }
    }

    async fn set_stream_volume(&self, index: &str, level: f32) {
        let level = format_level(level);
        self.run_logged(&["set-source-output-volume", index, &level])
            .await;
    }

    fn name(&self) -> &'static str {
        "pactl"
    }
}

fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*([A-Za-z0-9_.\-]+)\s*=\s*(.*?)\s*$"#).expect("valid field pattern")
    })
}

/// Parse `pactl list source-outputs` into capture streams
///
/// Records start at the `Source Output` header. Within a record only the
/// `key = "value"` property lines for the serial, application name and
/// binary are read. A record without serial or name is dropped; a missing
/// binary becomes `unknown*`.
pub fn parse_source_outputs(output: &str) -> Vec<CaptureStream> {
    output
        .split(RECORD_HEADER)
        .filter_map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Option<CaptureStream> {
    let mut index = None;
    let mut name = None;
    let mut binary = None;

    for line in record.lines() {
        let Some(caps) = field_pattern().captures(line) else {
            continue;
        };
        let value = || caps[2].replace('"', "").trim().to_string();

        match &caps[1] {
            INDEX_KEY => index = Some(value()),
            NAME_KEY => name = Some(value()),
            BINARY_KEY => binary = Some(value()),
            _ => {}
        }
    }

    let binary = binary
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNKNOWN_BINARY.to_string());

    Some(CaptureStream {
        index: index?,
        app_name: name?,
        binary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Source Output #83
	Driver: PipeWire
	Owner Module: n/a
	Client: 79
	Source: 56
	Sample Specification: float32le 1ch 48000Hz
	Mute: no
	Volume: mono: 65536 / 100% / 0.00 dB
	Properties:
		client.api = "pipewire-pulse"
		application.name = "Vesktop"
		application.process.binary = "vesktop"
		object.serial = "1147"
		media.name = "RecordStream"

Source Output #91
	Driver: PipeWire
	Properties:
		application.name = "Firefox"
		application.process.binary = "firefox"
		object.serial = "1203"

Source Output #95
	Driver: PipeWire
	Properties:
		application.name = "OBS Studio"
		object.serial = "1240"
"#;

    #[test]
    fn test_parse_source_outputs() {
        let streams = parse_source_outputs(SAMPLE);
        assert_eq!(
            streams,
            vec![
                CaptureStream::new("1147", "Vesktop", "vesktop"),
                CaptureStream::new("1203", "Firefox", "firefox"),
                CaptureStream::new("1240", "OBS Studio", UNKNOWN_BINARY),
            ]
        );
    }

    #[test]
    fn test_record_missing_index_or_name_is_dropped() {
        let output = r#"Source Output #1
	Properties:
		application.name = "No Serial"
Source Output #2
	Properties:
		object.serial = "22"
		application.process.binary = "nameless"
Source Output #3
	Properties:
		object.serial = "33"
		application.name = "Kept"
"#;
        let streams = parse_source_outputs(output);
        assert_eq!(streams, vec![CaptureStream::new("33", "Kept", UNKNOWN_BINARY)]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_source_outputs("").is_empty());
    }

    #[test]
    fn test_values_with_spaces_and_equals() {
        let output = "Source Output #4\n\t\tapplication.name = \"a = b\"\n\t\tobject.serial = \"7\"\n";
        let streams = parse_source_outputs(output);
        assert_eq!(streams[0].app_name, "a = b");
    }

    #[tokio::test]
    async fn test_missing_program_is_swallowed() {
        let control = PactlControl::new("micgate-test-no-such-program");
        assert!(control.default_source().await.is_none());
        assert!(control.list_capture_streams().await.is_empty());
        control.set_mute("source", true).await;
        control.set_stream_volume("1", 0.0).await;
    }

    #[tokio::test]
    async fn test_failing_program_is_swallowed() {
        let control = PactlControl::new("false");
        assert!(control.default_source().await.is_none());
        assert!(control.list_capture_streams().await.is_empty());
    }
}
