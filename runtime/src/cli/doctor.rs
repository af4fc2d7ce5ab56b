//! Environment readiness check.
//!
//! Every failed check prints the fix next to it.

use crate::cli::open_state;
use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use anyhow::Result;
use std::path::Path;
use std::process::Command;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub label: &'static str,
    pub level: Level,
    pub value: String,
    pub fix: Option<String>,
}

impl Check {
    fn new(label: &'static str, level: Level, value: impl Into<String>) -> Self {
        Self {
            label,
            level,
            value: value.into(),
            fix: None,
        }
    }

    fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }
}

pub async fn run() -> Result<()> {
    let config = RuntimeConfig::from_env();
    let checks = collect_checks(&config);
    let ready = checks.iter().all(|c| c.level != Level::Fail);

    if output::is_json() {
        let items: Vec<serde_json::Value> = checks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "check": c.label.trim_end_matches(':'),
                    "status": format!("{:?}", c.level).to_lowercase(),
                    "value": c.value,
                    "fix": c.fix,
                })
            })
            .collect();
        output::print_json(&serde_json::json!({ "ready": ready, "checks": items }));
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    output::print_section(&s, "Environment");
    for check in &checks {
        let symbol = match check.level {
            Level::Ok => s.ok_sym(),
            Level::Warn => s.warn_sym(),
            Level::Fail => s.fail_sym(),
        };
        output::print_check(symbol, check.label, &check.value);
        if let Some(fix) = &check.fix {
            output::print_detail(fix);
        }
    }
    eprintln!();
    if ready {
        eprintln!("  {}: {}", s.bold("Status"), s.green("ready"));
    } else {
        eprintln!("  {}: {}", s.bold("Status"), s.red("not ready"));
    }
    Ok(())
}

pub fn collect_checks(config: &RuntimeConfig) -> Vec<Check> {
    let mut checks = vec![Check::new(
        "OS:",
        Level::Ok,
        format!("{} ({})", format_os(), std::env::consts::ARCH),
    )];

    checks.push(match &config.chromium_path {
        Some(path) => Check::new(
            "Browser:",
            Level::Ok,
            format!(
                "{} at {}",
                chromium_version(path).as_deref().unwrap_or("unknown version"),
                path.display()
            ),
        ),
        None => Check::new("Browser:", Level::Fail, "no Chromium-family browser found").fix(
            "Install Google Chrome or Chromium, or set FOGCOVER_CHROMIUM_PATH.",
        ),
    });

    checks.push(check_data_dir(&config.home));

    match open_state(config) {
        Ok(state) => {
            checks.push(if state.api_key().is_some() {
                Check::new("API key:", Level::Ok, "configured")
            } else {
                Check::new("API key:", Level::Warn, "not set; only fallback sites will be browsed")
                    .fix("fogcover settings api-key <KEY>  or set GEMINI_API_KEY")
            });

            let personas = state.personas().all().map(|p| p.len()).unwrap_or(0);
            checks.push(if personas > 0 {
                Check::new("Personas:", Level::Ok, personas.to_string())
            } else {
                Check::new("Personas:", Level::Warn, "none")
                    .fix("fogcover persona add --name <NAME> --interests a,b")
            });

            if state.kill_switch() {
                checks.push(
                    Check::new("Kill switch:", Level::Warn, "ON; no sessions will run")
                        .fix("fogcover settings kill-switch off"),
                );
            }
        }
        Err(e) => checks.push(
            Check::new("Store:", Level::Fail, format!("cannot open: {e}"))
                .fix(format!("Check permissions on {}", config.db_path().display())),
        ),
    }

    if let Some(url) = &config.event_webhook {
        checks.push(Check::new("Webhook:", Level::Ok, url.clone()));
    }
    checks
}

fn check_data_dir(home: &Path) -> Check {
    let check_file = home.join(".doctor-write-check");
    let writable = std::fs::create_dir_all(home)
        .and_then(|_| std::fs::write(&check_file, b"ok"))
        .is_ok();
    let _ = std::fs::remove_file(&check_file);
    if writable {
        Check::new("Data dir:", Level::Ok, home.display().to_string())
    } else {
        Check::new("Data dir:", Level::Fail, format!("{} is not writable", home.display()))
            .fix("Fix permissions or point FOGCOVER_HOME elsewhere.")
    }
}

fn format_os() -> String {
    match std::env::consts::OS {
        "macos" => Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| format!("macOS {}", String::from_utf8_lossy(&out.stdout).trim()))
            .unwrap_or_else(|| "macOS".to_string()),
        "linux" => std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|contents| {
                contents
                    .lines()
                    .find_map(|line| line.strip_prefix("PRETTY_NAME="))
                    .map(|name| name.trim_matches('"').to_string())
            })
            .unwrap_or_else(|| "Linux".to_string()),
        other => other.to_string(),
    }
}

fn chromium_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(raw.replace("Google Chrome ", "").replace("Chromium ", ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_for_fresh_home() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().display().to_string();
        let config = RuntimeConfig::from_lookup(|key| match key {
            "FOGCOVER_HOME" => Some(home.clone()),
            _ => None,
        });
        let checks = collect_checks(&config);

        let find = |label: &str| checks.iter().find(|c| c.label == label).unwrap();
        assert_eq!(find("Data dir:").level, Level::Ok);
        assert_eq!(find("API key:").level, Level::Warn);
        assert_eq!(find("Personas:").level, Level::Warn);
        assert!(checks.iter().all(|c| c.label != "Kill switch:"));
    }
}
