//! Runtime configuration resolved from the environment.

use crate::runner::RunnerOptions;
use crate::scheduler::DEFAULT_INTERVAL;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Data directory (`FOGCOVER_HOME`, default `~/.fogcover`).
    pub home: PathBuf,
    /// Browser binary, if one was found.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub scheduler_interval: Duration,
    pub nav_timeout_ms: u64,
    /// Where activity events are forwarded, if anywhere.
    pub event_webhook: Option<String>,
    /// Used when no key is saved in settings.
    pub gemini_api_key: Option<String>,
    /// Overrides the default generation model.
    pub gemini_model: Option<String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("FOGCOVER_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_home);
        let chromium_path = find_chromium(var("FOGCOVER_CHROMIUM_PATH").as_deref(), &home);
        let headless = var("FOGCOVER_HEADLESS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let scheduler_interval = var("FOGCOVER_SCHEDULER_INTERVAL_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INTERVAL);
        let nav_timeout_ms = var("FOGCOVER_NAV_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_NAV_TIMEOUT_MS);

        Self {
            home,
            chromium_path,
            headless,
            scheduler_interval,
            nav_timeout_ms,
            event_webhook: var("FOGCOVER_EVENT_WEBHOOK"),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("FOGCOVER_GEMINI_MODEL"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join("fogcover.db")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.home.join("profiles")
    }

    pub fn activity_log_path(&self) -> PathBuf {
        self.home.join("activity.jsonl")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.home.join("fogcover.pid")
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            nav_timeout_ms: self.nav_timeout_ms,
            ..RunnerOptions::default()
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".fogcover")
}

/// Find a Chromium-family browser.
///
/// Checks the explicit path, then `<home>/chromium`, then the system PATH.
pub fn find_chromium(explicit: Option<&str>, home: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates = if cfg!(target_os = "macos") {
        vec![
            home.join("chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            home.join("chromium/chrome"),
        ]
    } else {
        vec![
            home.join("chromium/chrome"),
            home.join("chromium/chrome-linux64/chrome"),
        ]
    };
    if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
        return Some(found);
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}
