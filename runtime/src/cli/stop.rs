//! Stop the running Fogcover daemon.

use crate::cli::output::{self, Styled};
use crate::cli::run_cmd::process_alive;
use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use std::time::Duration;

/// Stop the daemon by reading the PID file and sending SIGTERM.
pub async fn run() -> Result<()> {
    let s = Styled::new();
    let pid_path = RuntimeConfig::from_env().pid_path();

    if !pid_path.exists() {
        if !output::is_quiet() {
            eprintln!("  Fogcover is not running.");
        }
        return Ok(());
    }

    let pid_str = std::fs::read_to_string(&pid_path).context("failed to read PID file")?;
    let pid: i32 = pid_str.trim().parse().context("invalid PID in PID file")?;

    if !process_alive(pid) {
        let _ = std::fs::remove_file(&pid_path);
        if !output::is_quiet() {
            eprintln!("  Cleaned up stale PID file (process {pid} was not running).");
        }
        return Ok(());
    }

    if !output::is_quiet() {
        eprint!("  Stopping Fogcover (PID {pid})...");
    }

    #[cfg(unix)]
    {
        let result = std::process::Command::new("kill")
            .args(["-INT", &pid.to_string()])
            .output()
            .context("failed to signal daemon")?;
        if !result.status.success() {
            let _ = std::fs::remove_file(&pid_path);
            if !output::is_quiet() {
                eprintln!(" {}", s.warn_sym());
                eprintln!("  Process may have already exited. Cleaned up PID file.");
            }
            return Ok(());
        }
    }

    // Sessions close their browsers on the way out, so allow some time.
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !process_alive(pid) {
            let _ = std::fs::remove_file(&pid_path);
            if !output::is_quiet() {
                eprintln!(" {}", s.ok_sym());
                eprintln!("  Fogcover stopped.");
            }
            return Ok(());
        }
    }

    if !output::is_quiet() {
        eprintln!(" {}", s.warn_sym());
        eprintln!("  Fogcover may still be running.");
        eprintln!("  If the problem persists, try: kill -9 {pid}");
    }
    Ok(())
}
