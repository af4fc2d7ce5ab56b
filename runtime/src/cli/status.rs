//! Show daemon, persona and recent activity status.

use crate::audit::logger::read_recent;
use crate::cli::output::{self, Styled};
use crate::cli::run_cmd::check_already_running;
use crate::cli::{format_event, open_state};
use crate::config::RuntimeConfig;
use anyhow::Result;
use std::time::SystemTime;

const RECENT_EVENTS: usize = 10;

pub async fn run() -> Result<()> {
    let s = Styled::new();
    let config = RuntimeConfig::from_env();
    let pid_path = config.pid_path();
    let pid = check_already_running(&pid_path);
    let uptime = pid.and(
        std::fs::metadata(&pid_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok()),
    );

    let state = open_state(&config)?;
    let personas = state.personas().all()?;
    let settings = state.settings();
    let recent = read_recent(&config.activity_log_path(), RECENT_EVENTS)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "running": pid.is_some(),
            "pid": pid,
            "uptime_s": uptime.map(|d| d.as_secs()),
            "killSwitch": settings.kill_switch,
            "personas": personas,
            "recent": recent,
        }));
        return Ok(());
    }

    eprintln!();
    match (pid, uptime) {
        (Some(pid), Some(uptime)) => eprintln!(
            "  {} running (PID {pid}, uptime {})",
            s.bold("Fogcover"),
            output::format_duration(uptime.as_secs())
        ),
        (Some(pid), None) => eprintln!("  {} running (PID {pid})", s.bold("Fogcover")),
        _ => eprintln!(
            "  {} not running. Start with 'fogcover run'.",
            s.bold("Fogcover")
        ),
    }
    if settings.kill_switch {
        eprintln!("  {} Kill switch is ON", s.warn_sym());
    }
    eprintln!();

    output::print_section(&s, "Personas");
    if personas.is_empty() {
        eprintln!("    {}", s.dim("none; add one with 'fogcover persona add'"));
    }
    for persona in &personas {
        let symbol = if persona.is_active {
            s.ok_sym()
        } else {
            s.info_sym()
        };
        let days: Vec<String> = persona.schedule.days.iter().map(|d| d.to_string()).collect();
        output::print_check(
            symbol,
            &persona.name,
            &format!(
                "{} {}-{} {} ({})",
                persona.intensity,
                persona.schedule.start.format("%H:%M"),
                persona.schedule.end.format("%H:%M"),
                days.join(","),
                s.dim(&persona.id)
            ),
        );
    }
    eprintln!();

    if !recent.is_empty() {
        output::print_section(&s, "Recent activity");
        for event in &recent {
            eprintln!("{}", format_event(&s, event));
        }
        eprintln!();
    }
    Ok(())
}
