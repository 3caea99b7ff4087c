//! Systemd user service management for micgate

use super::{get_micgate_path, print_failure, print_info, print_success};
use std::path::PathBuf;
use tokio::process::Command;

const UNIT: &str = "micgate.service";

/// `~/.config/systemd/user/micgate.service`
fn unit_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("systemd/user"))
        .unwrap_or_else(|| PathBuf::from("~/.config/systemd/user"))
        .join(UNIT)
}

/// Unit file running `micgate daemon`, restarted without a start limit
fn unit_file(exec: &str) -> String {
    format!(
        r#"[Unit]
Description=micgate chord-based push-to-talk
PartOf=graphical-session.target
After=graphical-session.target pipewire-pulse.service
Wants=graphical-session.target
StartLimitIntervalSec=0

[Service]
Type=simple
ExecStart={exec} daemon
Restart=always
RestartSec=1
Environment=XDG_RUNTIME_DIR=%t

[Install]
WantedBy=graphical-session.target
"#
    )
}

/// Run `systemctl --user <args>`; true when it exits successfully
async fn systemctl(args: &[&str]) -> anyhow::Result<bool> {
    let status = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .status()
        .await?;
    Ok(status.success())
}

/// Write the unit, then enable and start it
pub async fn install() -> anyhow::Result<()> {
    let path = unit_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, unit_file(&get_micgate_path()))?;
    print_success(&format!("Wrote {:?}", path));

    if !systemctl(&["daemon-reload"]).await? {
        print_failure("systemctl --user daemon-reload failed");
        return Ok(());
    }

    if systemctl(&["enable", "--now", UNIT]).await? {
        print_success("micgate enabled and started");
        print_info("Logs: journalctl --user -u micgate -f");
    } else {
        print_failure("Could not enable micgate");
        print_info("Check: systemctl --user status micgate");
    }

    Ok(())
}

/// Stop and disable the unit, then remove it
pub async fn uninstall() -> anyhow::Result<()> {
    // Fails harmlessly when the unit was never enabled
    systemctl(&["disable", "--now", UNIT]).await?;

    let path = unit_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
        print_success(&format!("Removed {:?}", path));
    } else {
        print_info("No micgate unit installed");
    }

    systemctl(&["daemon-reload"]).await?;
    Ok(())
}

/// Show `systemctl --user status micgate`
pub async fn status() -> anyhow::Result<()> {
    // status exits non-zero for a stopped unit; its output is what matters
    systemctl(&["status", "--no-pager", UNIT]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_runs_daemon_and_always_restarts() {
        let content = unit_file("/usr/local/bin/micgate");
        assert!(content.contains("ExecStart=/usr/local/bin/micgate daemon\n"));
        assert!(content.contains("Restart=always"));
        assert!(content.contains("RestartSec=1"));
        assert!(content.contains("StartLimitIntervalSec=0"));
        assert!(content.contains("WantedBy=graphical-session.target"));
    }

    #[test]
    fn test_unit_path_name() {
        assert!(unit_path().ends_with("systemd/user/micgate.service"));
    }
}
