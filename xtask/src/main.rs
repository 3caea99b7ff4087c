//! Development tasks for micgate
//!
//! Usage:
//!   cargo xtask install     Install release binary to /usr/local/bin (requires sudo)
//!   cargo xtask uninstall   Remove binary and man pages (requires sudo)
//!   cargo xtask dist        Build release binary and man pages into dist/

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const BIN_DIR: &str = "/usr/local/bin";
const MAN_DIR: &str = "/usr/local/share/man/man1";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(command) = args.first() else {
        print_help();
        return ExitCode::SUCCESS;
    };

    let result = match command.as_str() {
        "install" => install(),
        "uninstall" => uninstall(),
        "dist" => dist(),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
micgate development tasks

Usage: cargo xtask <COMMAND>

Commands:
  install    Build release binary, install it and its man pages (requires sudo)
  uninstall  Remove micgate and its man pages (requires sudo)
  dist       Build release binary and man pages into dist/

Examples:
  cargo xtask install
  cargo xtask dist
  cargo xtask uninstall
"#
    );
}

/// Get the project root directory
fn project_root() -> anyhow::Result<PathBuf> {
    let dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir()?,
    };

    // xtask is in a subdirectory, go up one level
    Ok(dir.parent().unwrap_or(&dir).to_path_buf())
}

/// Build the release binary with man pages; returns (binary, man page dir)
fn build_release(root: &Path) -> anyhow::Result<(PathBuf, Option<PathBuf>)> {
    println!("==> Building release binary...");

    let status = Command::new("cargo")
        .args(["build", "--release"])
        .env("MICGATE_GEN_MANPAGES", "1")
        .current_dir(root)
        .status()?;

    if !status.success() {
        anyhow::bail!("Build failed");
    }

    let binary = root.join("target/release/micgate");
    if !binary.exists() {
        anyhow::bail!("Binary not found at {:?}", binary);
    }

    Ok((binary, find_man_dir(root)))
}

/// Locate the newest man page output from build.rs
fn find_man_dir(root: &Path) -> Option<PathBuf> {
    let build_dir = root.join("target/release/build");

    std::fs::read_dir(build_dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("micgate-"))
        .map(|entry| entry.path().join("out/man"))
        .filter(|dir| dir.join("micgate.1").exists())
        .max_by_key(|dir| {
            std::fs::metadata(dir.join("micgate.1"))
                .and_then(|m| m.modified())
                .ok()
        })
}

fn man_pages(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "1"))
        .collect();
    pages.sort();
    Ok(pages)
}

fn sudo_install(source: &Path, dest: &str, mode: &str) -> anyhow::Result<()> {
    let status = Command::new("sudo")
        .arg("install")
        .arg(format!("-Dm{}", mode))
        .arg(source)
        .arg(dest)
        .status()?;

    if !status.success() {
        anyhow::bail!("Install of {:?} failed (sudo required)", source);
    }
    Ok(())
}

/// Build release binary and install to /usr/local
fn install() -> anyhow::Result<()> {
    let root = project_root()?;
    let (binary, man_dir) = build_release(&root)?;

    println!("==> Installing to {}/micgate...", BIN_DIR);
    sudo_install(&binary, &format!("{}/micgate", BIN_DIR), "755")?;

    if let Some(man_dir) = man_dir {
        for page in man_pages(&man_dir)? {
            if let Some(name) = page.file_name() {
                let dest = format!("{}/{}", MAN_DIR, name.to_string_lossy());
                sudo_install(&page, &dest, "644")?;
            }
        }
        println!("==> Man pages installed to {}", MAN_DIR);
    }

    println!("==> Installed successfully!");
    println!();
    println!("Next: micgate setup && micgate setup systemd");

    let _ = Command::new(format!("{}/micgate", BIN_DIR))
        .arg("--version")
        .status();

    Ok(())
}

/// Remove micgate from /usr/local
fn uninstall() -> anyhow::Result<()> {
    println!("==> Removing {}/micgate and man pages...", BIN_DIR);

    let status = Command::new("sudo")
        .args([
            "sh",
            "-c",
            &format!("rm -f {}/micgate {}/micgate*.1", BIN_DIR, MAN_DIR),
        ])
        .status()?;

    if !status.success() {
        anyhow::bail!("Uninstall failed (sudo required)");
    }

    println!("==> Uninstalled successfully!");
    Ok(())
}

/// Build release binary and collect it with its man pages under dist/
fn dist() -> anyhow::Result<()> {
    let root = project_root()?;
    let (binary, man_dir) = build_release(&root)?;

    let dist = root.join("dist");
    std::fs::create_dir_all(dist.join("man"))?;
    std::fs::copy(&binary, dist.join("micgate"))?;

    if let Some(man_dir) = man_dir {
        for page in man_pages(&man_dir)? {
            if let Some(name) = page.file_name() {
                std::fs::copy(&page, dist.join("man").join(name))?;
            }
        }
    }

    println!("==> Built: {:?}", dist);

    let _ = Command::new("ls").arg("-lhR").arg(&dist).status();

    Ok(())
}
