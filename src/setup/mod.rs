//! Setup module for micgate installation and configuration
//!
//! Provides subcommands for:
//! - Environment checks (input group, control program, devices, config file)
//! - systemd service installation

pub mod systemd;

use crate::audio::{self, AudioControl};
use crate::config::{Config, DEFAULT_CONFIG};
use crate::input;

/// Check if user is in a specific group
pub fn user_in_group(group: &str) -> bool {
    std::process::Command::new("groups")
        .output()
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .split_whitespace()
                .any(|g| g == group)
        })
        .unwrap_or(false)
}

/// Get the micgate binary path
pub fn get_micgate_path() -> String {
    std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "micgate".to_string())
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("  \x1b[32m✓\x1b[0m {}", msg);
}

/// Print a failure message
pub fn print_failure(msg: &str) {
    println!("  \x1b[31m✗\x1b[0m {}", msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("  \x1b[34mℹ\x1b[0m {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  \x1b[33m⚠\x1b[0m {}", msg);
}

/// Write the default config file if none exists yet
///
/// Returns the path when a file was written.
pub fn write_default_config() -> anyhow::Result<Option<std::path::PathBuf>> {
    let Some(path) = Config::default_path() else {
        anyhow::bail!("Could not determine config directory");
    };

    if path.exists() {
        return Ok(None);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, DEFAULT_CONFIG)?;
    Ok(Some(path))
}

/// Run the environment checks
pub async fn run_checks(config: &Config) -> anyhow::Result<()> {
    println!("micgate setup\n");
    println!("=============\n");

    let mut all_ok = true;

    println!("Checking input group membership...");
    if user_in_group("input") {
        print_success("User is in 'input' group");
    } else {
        print_failure("User is NOT in 'input' group");
        println!("    Run: sudo usermod -aG input $USER");
        println!("    Then log out and back in");
        all_ok = false;
    }

    println!("\nChecking input devices...");
    let devices = input::list_devices();
    let matched: Vec<_> = devices
        .iter()
        .filter(|(_, name)| input::name_matches(name, &config.devices))
        .collect();

    if devices.is_empty() {
        print_failure("No readable input devices under /dev/input");
        all_ok = false;
    } else if matched.is_empty() {
        if config.devices.keyboard_fallback {
            print_warning("No configured device found, will fall back to a keyboard");
        } else {
            print_failure(&format!(
                "None of {:?} found ({} devices readable)",
                config.devices.names,
                devices.len()
            ));
            println!("    Run: micgate devices");
            all_ok = false;
        }
    } else {
        for (path, name) in matched {
            print_success(&format!("'{}' at {:?}", name, path));
        }
    }

    println!("\nChecking audio control...");
    match which::which(&config.audio.command) {
        Ok(path) => {
            print_success(&format!("{} found at {:?}", config.audio.command, path));

            let control = audio::create_control(&config.audio);
            match control.default_source().await {
                Some(source) => print_success(&format!("Default source: {}", source)),
                None => {
                    print_failure("Could not query the default source");
                    println!("    Is PipeWire (pipewire-pulse) or PulseAudio running?");
                    all_ok = false;
                }
            }
        }
        Err(_) => {
            print_failure(&format!("{} not found", config.audio.command));
            println!("    Install pulseaudio-utils (or libpulse) via your package manager");
            all_ok = false;
        }
    }

    println!("\nChecking configuration...");
    match write_default_config() {
        Ok(Some(path)) => print_success(&format!("Wrote default config to {:?}", path)),
        Ok(None) => print_info(&format!(
            "Config file: {:?}",
            Config::default_path().unwrap_or_default()
        )),
        Err(e) => {
            print_failure(&format!("Could not write config: {}", e));
            all_ok = false;
        }
    }

    match crate::rules::Bindings::from_config(&config.binds) {
        Ok(bindings) => print_success(&format!("{} chord(s) bound", bindings.len())),
        Err(e) => {
            print_failure(&format!("{}", e));
            all_ok = false;
        }
    }

    println!("\n---");
    if all_ok {
        println!("✓ All checks passed! Run 'micgate' to start.");
    } else {
        println!("✗ Some checks failed. Please fix the issues above.");
    }

    Ok(())
}
