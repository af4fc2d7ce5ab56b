//! Settings subcommands.

use crate::cli::open_state;
use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use crate::store::Settings;
use anyhow::{bail, Result};
use clap::{Subcommand, ValueEnum};

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Show current settings
    Show,
    /// Save the generation API key (empty string clears it)
    ApiKey { key: String },
    /// Turn the kill switch on or off
    KillSwitch {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Allow a domain (substring match)
    SafeListAdd { domain: String },
    /// Remove a domain from the safe list
    SafeListRemove { domain: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

pub async fn run(action: SettingsAction) -> Result<()> {
    let state = open_state(&RuntimeConfig::from_env())?;
    let s = Styled::new();

    if let SettingsAction::Show = action {
        let settings = state.settings();
        if output::is_json() {
            let mut value = serde_json::to_value(&settings)?;
            value["apiKey"] = serde_json::Value::String(mask_key(&settings.api_key));
            output::print_json(&value);
        } else {
            print_settings(&s, &settings, state.api_key().is_some());
        }
        return Ok(());
    }

    let mut settings = state.settings();
    let message = apply(&mut settings, action)?;
    state.save_settings(settings)?;
    eprintln!("  {} {message}", s.ok_sym());
    Ok(())
}

/// Apply a mutating action. Returns a confirmation line.
pub fn apply(settings: &mut Settings, action: SettingsAction) -> Result<String> {
    let message = match action {
        SettingsAction::Show => String::new(),
        SettingsAction::ApiKey { key } => {
            settings.api_key = key.trim().to_string();
            if settings.api_key.is_empty() {
                "API key cleared".to_string()
            } else {
                "API key saved".to_string()
            }
        }
        SettingsAction::KillSwitch { state } => {
            settings.kill_switch = state == Toggle::On;
            if settings.kill_switch {
                "Kill switch ON; running sessions will stop".to_string()
            } else {
                "Kill switch OFF".to_string()
            }
        }
        SettingsAction::SafeListAdd { domain } => {
            let domain = domain.trim().to_lowercase();
            if domain.is_empty() {
                bail!("domain must not be empty");
            }
            if settings.safe_list.contains(&domain) {
                format!("{domain} is already allowed")
            } else {
                settings.safe_list.push(domain.clone());
                format!("Added {domain}")
            }
        }
        SettingsAction::SafeListRemove { domain } => {
            let domain = domain.trim().to_lowercase();
            let before = settings.safe_list.len();
            settings.safe_list.retain(|d| *d != domain);
            if settings.safe_list.len() == before {
                bail!("{domain} is not on the safe list");
            }
            if settings.safe_list.is_empty() {
                format!("Removed {domain}; the safe list is empty, so any domain is allowed")
            } else {
                format!("Removed {domain}")
            }
        }
    };
    Ok(message)
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(chars.len() - 4))
}

fn print_settings(s: &Styled, settings: &Settings, has_key: bool) {
    output::print_header(s);
    output::print_section(s, "Settings");
    let key_display = if !settings.api_key.is_empty() {
        mask_key(&settings.api_key)
    } else if has_key {
        "from GEMINI_API_KEY".to_string()
    } else {
        "not set (fallback catalog only)".to_string()
    };
    output::print_check(
        if has_key { s.ok_sym() } else { s.warn_sym() },
        "API key:",
        &key_display,
    );
    output::print_check(
        if settings.kill_switch {
            s.warn_sym()
        } else {
            s.ok_sym()
        },
        "Kill switch:",
        if settings.kill_switch { "ON" } else { "off" },
    );
    let safe = if settings.safe_list.is_empty() {
        "empty (any domain)".to_string()
    } else {
        format!("{} domains", settings.safe_list.len())
    };
    output::print_check(s.info_sym(), "Safe list:", &safe);
    for domain in &settings.safe_list {
        output::print_detail(&s.dim(domain));
    }
    eprintln!();
}
