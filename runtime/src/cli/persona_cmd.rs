//! Persona management subcommands.

use crate::cli::open_state;
use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use crate::persona::types::parse_time;
use crate::persona::{Intensity, PersonaDraft, Schedule};
use anyhow::{anyhow, bail, Result};
use chrono::Weekday;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum PersonaAction {
    /// List configured personas
    List,
    /// Create a persona
    Add(AddArgs),
    /// Delete a persona by id
    Remove { id: String },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Comma-separated interests, e.g. "baking,jazz"
    #[arg(long, value_delimiter = ',')]
    pub interests: Vec<String>,
    /// Window start (HH:MM)
    #[arg(long, default_value = "09:00")]
    pub start: String,
    /// Window end (HH:MM), exclusive
    #[arg(long, default_value = "17:00")]
    pub end: String,
    /// Comma-separated weekdays
    #[arg(long, value_delimiter = ',', default_value = "Mon,Tue,Wed,Thu,Fri")]
    pub days: Vec<String>,
    #[arg(long, value_enum, default_value_t = Intensity::Medium)]
    pub intensity: Intensity,
}

pub async fn run(action: PersonaAction) -> Result<()> {
    let state = open_state(&RuntimeConfig::from_env())?;
    let manager = state.personas();
    let s = Styled::new();

    match action {
        PersonaAction::List => {
            let personas = manager.all()?;
            if output::is_json() {
                output::print_json(&serde_json::to_value(&personas)?);
                return Ok(());
            }
            if personas.is_empty() {
                eprintln!("  No personas yet. Add one with 'fogcover persona add --name ...'.");
            }
            for p in personas {
                eprintln!(
                    "  {} {} {}",
                    if p.is_active { s.ok_sym() } else { s.info_sym() },
                    s.bold(&p.name),
                    s.dim(&p.id)
                );
                eprintln!("      interests: {}", p.interests.join(", "));
                eprintln!(
                    "      schedule:  {}-{} {}",
                    p.schedule.start.format("%H:%M"),
                    p.schedule.end.format("%H:%M"),
                    p.schedule
                        .days
                        .iter()
                        .map(|d| d.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                );
                eprintln!("      intensity: {}", p.intensity);
            }
        }
        PersonaAction::Add(args) => {
            let schedule = build_schedule(&args.start, &args.end, &args.days)?;
            let interests = args
                .interests
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            let persona = manager.save(PersonaDraft {
                name: Some(args.name),
                interests: Some(interests),
                schedule: Some(schedule),
                intensity: Some(args.intensity),
                ..Default::default()
            })?;
            if output::is_json() {
                output::print_json(&serde_json::to_value(&persona)?);
            } else {
                eprintln!("  {} Created {} ({})", s.ok_sym(), persona.name, persona.id);
            }
        }
        PersonaAction::Remove { id } => {
            if !manager.delete(&id)? {
                bail!("persona not found: {id}");
            }
            eprintln!("  {} Removed {id}", s.ok_sym());
        }
    }
    Ok(())
}

/// Build a schedule from CLI strings.
pub fn build_schedule(start: &str, end: &str, days: &[String]) -> Result<Schedule> {
    let start = parse_time(start).map_err(|e| anyhow!(e))?;
    let end = parse_time(end).map_err(|e| anyhow!(e))?;
    if end <= start {
        bail!("schedule end must be after start");
    }
    let mut parsed = Vec::new();
    for day in days.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        let weekday: Weekday = day
            .parse()
            .map_err(|_| anyhow!("invalid weekday '{day}'"))?;
        if !parsed.contains(&weekday) {
            parsed.push(weekday);
        }
    }
    if parsed.is_empty() {
        bail!("schedule needs at least one day");
    }
    Ok(Schedule {
        start,
        end,
        days: parsed,
    })
}
