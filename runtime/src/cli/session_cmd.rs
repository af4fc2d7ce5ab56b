//! Run one persona's session in the foreground.

use crate::audit::ActivityLog;
use crate::cli::output::{self, Styled};
use crate::cli::run_cmd::check_already_running;
use crate::cli::{format_event, init_tracing, Engine};
use crate::config::RuntimeConfig;
use crate::runner::events::ActivityKind;
use anyhow::{bail, Result};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

/// Browse as `persona_id` until Ctrl-C or until the session ends itself.
pub async fn run(persona_id: &str) -> Result<()> {
    let s = Styled::new();
    let config = RuntimeConfig::from_env();
    if let Err(e) = ensure_no_daemon(&config.pid_path()) {
        eprintln!("  {} {e}", s.warn_sym());
        eprintln!("  Use 'fogcover stop' first, or let the daemon's schedule run this persona.");
        return Err(e);
    }
    init_tracing();
    let engine = Engine::open(config)?;

    let log_task = ActivityLog::open(&engine.config.activity_log_path())?.spawn(engine.runner.subscribe());
    let mut feed = engine.runner.subscribe();
    engine.commands.start_session(persona_id).await?;

    if !output::is_quiet() {
        eprintln!("  {} Session running. Press Ctrl-C to stop.", s.ok_sym());
        eprintln!();
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                engine.commands.stop_session(persona_id).await?;
                break;
            }
            event = feed.recv() => match event {
                Ok(event) => {
                    if !output::is_quiet() {
                        eprintln!("{}", format_event(&s, &event));
                    }
                    if event.persona_id == persona_id && event.kind == ActivityKind::Stop {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }

    log_task.abort();
    Ok(())
}

/// Refuse to run while a daemon owns the browser profiles.
pub fn ensure_no_daemon(pid_path: &Path) -> Result<()> {
    if let Some(pid) = check_already_running(pid_path) {
        bail!("the Fogcover daemon is running (PID {pid})");
    }
    Ok(())
}
