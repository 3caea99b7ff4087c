//! Build script for micgate
//!
//! Renders man pages for the command and every subcommand from the clap
//! definitions in src/cli.rs.

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs::{self, File};
use std::io::Error;
use std::path::{Path, PathBuf};

// Include the CLI module
include!("src/cli.rs");

fn main() -> Result<(), Error> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=MICGATE_GEN_MANPAGES");

    // Only for release builds or when explicitly requested
    let profile = env::var("PROFILE").unwrap_or_default();
    if env::var("MICGATE_GEN_MANPAGES").is_err() && profile != "release" {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let written = render(Cli::command(), "micgate", &man_dir)?;

    println!(
        "cargo:warning={} man pages generated in: {}",
        written,
        man_dir.display()
    );

    Ok(())
}

/// Write `<page>.1` for `cmd`, then recurse into its subcommands as
/// `<page>-<sub>.1`. Returns the number of pages written.
fn render(cmd: clap::Command, page: &str, dir: &Path) -> Result<usize, Error> {
    let mut file = File::create(dir.join(format!("{}.1", page)))?;
    Man::new(cmd.clone()).render(&mut file)?;

    let mut written = 1;
    for sub in cmd.get_subcommands().filter(|s| s.get_name() != "help") {
        let sub_page = format!("{}-{}", page, sub.get_name());
        written += render(sub.clone(), &sub_page, dir)?;
    }

    Ok(written)
}
