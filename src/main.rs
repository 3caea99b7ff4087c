//! micgate - Chord-based push-to-talk for PipeWire/PulseAudio
//!
//! Run with `micgate` or `micgate daemon` to start the daemon.
//! Use `micgate devices` to find the device to monitor.
//! Use `micgate streams --chord F13` to preview what a chord would do.

use clap::Parser;
use micgate::audio::{self, AudioControl};
use micgate::config::{self, Config};
use micgate::input;
use micgate::rules::{self, Bindings, Resolution, RuleSet};
use micgate::tracker::Chord;
use micgate::{keys, setup, Cli, Commands, Daemon, SetupAction};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("micgate={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(volume) = cli.volume {
        config.audio.target_volume = volume;
    }
    if !cli.device.is_empty() {
        config.devices.names = cli.device;
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            if let Err(e) = daemon.run().await {
                tracing::error!("{}", e);
                std::process::exit(e.exit_code());
            }
        }

        Commands::Config => {
            show_config(&config)?;
        }

        Commands::Devices => {
            show_devices(&config);
        }

        Commands::Streams { chord, json } => {
            show_streams(&config, chord.as_deref(), json).await?;
        }

        Commands::Setup { action } => match action {
            None => setup::run_checks(&config).await?,
            Some(SetupAction::Systemd { uninstall, status }) => {
                if status {
                    setup::systemd::status().await?;
                } else if uninstall {
                    setup::systemd::uninstall().await?;
                } else {
                    setup::systemd::install().await?;
                }
            }
        },
    }

    Ok(())
}

/// Show current configuration
fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Current Configuration\n");
    println!("=====================\n");

    print!("{}", toml::to_string_pretty(config)?);

    println!("\n---");
    println!(
        "Config file: {:?}",
        Config::default_path().unwrap_or_else(|| PathBuf::from("(not found)"))
    );
    println!("Lock file: {:?}", Config::runtime_dir().join("micgate.lock"));

    match Bindings::from_config(&config.binds) {
        Ok(bindings) => {
            println!("\nBound chords:");
            for (chord, rules) in bindings.entries() {
                println!("  {:<16} {}", chord.to_string(), rules);
            }
            println!("  {:<16} mute mic, restore every stream", Chord::default().to_string());
        }
        Err(e) => println!("\nBindings are invalid: {}", e),
    }

    Ok(())
}

/// List input devices, marking the ones the daemon would monitor
fn show_devices(config: &Config) {
    let devices = input::list_devices();

    if devices.is_empty() {
        println!("No readable input devices.");
        println!("Is the user in the 'input' group? Run: micgate setup");
        return;
    }

    for (path, name) in &devices {
        let marker = if input::name_matches(name, &config.devices) {
            "*"
        } else {
            " "
        };
        println!("{} {:<20} {}", marker, path.display(), name);
    }

    println!("\n* = monitored (devices.names = {:?})", config.devices.names);
}

/// Classify the live capture streams under a chord without changing anything
async fn show_streams(config: &Config, chord: Option<&str>, json: bool) -> anyhow::Result<()> {
    let bindings = Bindings::from_config(&config.binds)?;

    let keys = chord
        .unwrap_or("")
        .split(|c: char| c.is_whitespace() || c == '+')
        .filter(|k| !k.is_empty())
        .map(keys::parse_key_name)
        .collect::<Result<Vec<_>, _>>()?;

    let (chord, rules, resolution) = match bindings.resolve(keys) {
        Resolution::ReleaseAll(rules) => (Chord::default(), rules, "release_all"),
        Resolution::Rule { chord, rules } => (chord, rules.clone(), "rule"),
        Resolution::Unbound(chord) => (chord, RuleSet::from_directives(Vec::new()), "unbound"),
    };

    let control = audio::create_control(&config.audio);
    let streams = control.list_capture_streams().await;
    let classified = rules::classify(&rules, &streams, config.audio.target_volume);

    if json {
        // An unbound chord changes nothing, so there is nothing to classify
        let streams = if resolution == "unbound" {
            serde_json::to_value(&streams)?
        } else {
            serde_json::to_value(&classified)?
        };
        let output = serde_json::json!({
            "chord": chord.as_str(),
            "resolution": resolution,
            "rules": rules.to_string(),
            "streams": streams,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match resolution {
        "unbound" => {
            println!("Chord '{}' is not bound: nothing would change.", chord);
            for stream in &streams {
                println!("  {:<24} [{}]", stream.app_name, stream.binary);
            }
            return Ok(());
        }
        "release_all" => println!("No key held: mic muted, every stream restored"),
        _ => println!("Chord '{}' {}", chord, rules),
    }

    if classified.is_empty() {
        println!("  (no capture streams)");
    }
    for item in &classified {
        println!(
            "  {:<24} [{}] -> {} ({})",
            item.stream.app_name,
            item.stream.binary,
            item.decision,
            audio::format_level(item.level)
        );
    }

    Ok(())
}
