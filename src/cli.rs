// Command-line interface definitions for micgate
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "micgate")]
#[command(author, version, about = "Chord-based push-to-talk for PipeWire/PulseAudio")]
#[command(long_about = "
micgate keeps your microphone muted and opens it only while a bound key
combination is held. Each combination carries its own per-application
rules, so one key can talk to Discord only while another talks to everything.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Run: micgate devices (to find the name of your key device)
  4. Edit ~/.config/micgate/config.toml (micgate setup writes a default one)
  5. Run: micgate (to start the daemon)

USAGE:
  Hold F13 to speak to vesktop and gpu-screen-recorder only,
  F15 to speak to everything except vesktop, F13+F15 to speak to everything.
  Releasing every key mutes the microphone again.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the target volume (e.g., 1.0 for 100%)
    #[arg(long, value_name = "LEVEL")]
    pub volume: Option<f32>,

    /// Override the monitored input device (repeatable)
    #[arg(long, value_name = "NAME")]
    pub device: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Show current configuration
    Config,

    /// List input devices and which ones would be monitored
    Devices,

    /// Show active capture streams and how a chord would treat them (changes nothing)
    Streams {
        /// Chord to evaluate, e.g. "f13 f15" (default: no key held)
        #[arg(long, value_name = "KEYS")]
        chord: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Setup and installation utilities
    Setup {
        #[command(subcommand)]
        action: Option<SetupAction>,
    },
}

#[derive(Subcommand)]
pub enum SetupAction {
    /// Install micgate as a systemd user service
    Systemd {
        /// Uninstall the service instead of installing
        #[arg(long)]
        uninstall: bool,

        /// Show service status
        #[arg(long)]
        status: bool,
    },
}
