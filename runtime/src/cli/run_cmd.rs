//! Run the Fogcover daemon: scheduler, activity log and console feed.

use crate::audit::{ActivityLog, WebhookForwarder};
use crate::cli::output::{self, Styled};
use crate::cli::{format_event, init_tracing, Engine};
use crate::config::RuntimeConfig;
use crate::scheduler::{Scheduler, SessionControl};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Check if a daemon is already running. Returns the PID if so.
pub fn check_already_running(pid_path: &Path) -> Option<i32> {
    let pid_str = std::fs::read_to_string(pid_path).ok()?;
    let pid: i32 = pid_str.trim().parse().ok()?;
    if process_alive(pid) {
        return Some(pid);
    }
    // Stale PID file
    let _ = std::fs::remove_file(pid_path);
    None
}

pub fn process_alive(pid: i32) -> bool {
    #[cfg(unix)]
    {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub async fn run() -> Result<()> {
    let s = Styled::new();
    let config = RuntimeConfig::from_env();
    let pid_path = config.pid_path();

    if let Some(pid) = check_already_running(&pid_path) {
        eprintln!("  {} Fogcover is already running (PID {pid}).", s.warn_sym());
        eprintln!("  Use 'fogcover stop' first.");
        bail!("daemon already running");
    }

    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("failed to create {}", config.home.display()))?;
    init_tracing();
    info!("starting Fogcover v{}", env!("CARGO_PKG_VERSION"));

    std::fs::write(&pid_path, std::process::id().to_string())
        .context("failed to write PID file")?;

    let result = serve(config, &s).await;

    let _ = std::fs::remove_file(&pid_path);
    if !output::is_quiet() {
        eprintln!("  {} Fogcover stopped.", s.ok_sym());
    }
    result
}

async fn serve(config: RuntimeConfig, s: &Styled) -> Result<()> {
    let engine = Engine::open(config)?;

    // No session survives a restart.
    let cleared = engine.state.personas().clear_active_flags()?;
    if cleared > 0 {
        info!("cleared {cleared} stale active flags");
    }

    let log = ActivityLog::open(&engine.config.activity_log_path())?;
    let log_task = log.spawn(engine.runner.subscribe());
    let webhook_task = WebhookForwarder::from_config(engine.config.event_webhook.as_deref())
        .map(|forwarder| forwarder.forward_from(engine.runner.subscribe()));

    if !output::is_quiet() {
        eprintln!(
            "  {} Fogcover v{} started (PID {})",
            s.ok_sym(),
            env!("CARGO_PKG_VERSION"),
            std::process::id()
        );
        eprintln!("  Data in {}", engine.config.home.display());
        if engine.config.chromium_path.is_none() {
            eprintln!("  {} No browser found; run 'fogcover doctor'.", s.warn_sym());
        }
        eprintln!();
    }

    let mut feed = engine.runner.subscribe();
    let console_task = tokio::spawn(async move {
        let s = Styled::new();
        loop {
            match feed.recv().await {
                Ok(event) => {
                    if !output::is_quiet() {
                        eprintln!("{}", format_event(&s, &event));
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signal.notify_one();
    });

    let control: Arc<dyn SessionControl> = Arc::new(engine.runner.clone());
    let scheduler = Scheduler::new(control, engine.state.clone(), engine.config.scheduler_interval);
    scheduler.run(shutdown).await;

    for id in engine.runner.active_ids() {
        engine.runner.stop_session(&id).await;
        if let Err(e) = engine.state.personas().set_active(&id, false) {
            warn!(persona = %id, "failed to clear active flag: {e}");
        }
    }

    console_task.abort();
    log_task.abort();
    if let Some(task) = webhook_task {
        task.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_pid_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("fogcover.pid");
        std::fs::write(&pid_path, "not-a-pid").unwrap();
        assert!(check_already_running(&pid_path).is_none());

        assert!(check_already_running(&dir.path().join("missing.pid")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_own_pid_counts_as_running() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("fogcover.pid");
        std::fs::write(&pid_path, std::process::id().to_string()).unwrap();
        assert_eq!(
            check_already_running(&pid_path),
            Some(std::process::id() as i32)
        );
    }
}
