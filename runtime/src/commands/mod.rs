//! Command surface for a UI front end.
//!
//! Manual start and stop go through here so the persisted `is_active` flag
//! always follows the runner.

use crate::metrics::Metrics;
use crate::runner::SessionRunner;
use crate::store::{Settings, SharedState};
use anyhow::{bail, Context, Result};
use tracing::info;

#[derive(Clone)]
pub struct Commands {
    runner: SessionRunner,
    state: SharedState,
}

impl Commands {
    pub fn new(runner: SessionRunner, state: SharedState) -> Self {
        Self { runner, state }
    }

    pub fn runner(&self) -> &SessionRunner {
        &self.runner
    }

    /// Start a session for a stored persona.
    pub async fn start_session(&self, persona_id: &str) -> Result<()> {
        if self.state.kill_switch() {
            bail!("kill switch is on; turn it off before starting sessions");
        }
        let persona = self
            .state
            .personas()
            .get(persona_id)?
            .with_context(|| format!("persona not found: {persona_id}"))?;

        self.runner.start_session(&persona).await?;
        if !self.runner.is_active(persona_id) {
            bail!("session for {} ended while starting", persona.name);
        }
        self.state.personas().set_active(persona_id, true)?;
        info!(persona = %persona_id, "session started by command");
        Ok(())
    }

    pub async fn stop_session(&self, persona_id: &str) -> Result<()> {
        self.runner.stop_session(persona_id).await;
        if self.state.personas().get(persona_id)?.is_some() {
            self.state.personas().set_active(persona_id, false)?;
        }
        Ok(())
    }

    pub fn metrics(&self) -> Metrics {
        self.state.metrics()
    }

    pub fn settings(&self) -> Settings {
        self.state.settings()
    }

    /// Replace the settings. Turning the kill switch on ends every session
    /// at its next checkpoint.
    pub fn save_settings(&self, settings: Settings) -> Result<Settings> {
        self.state.save_settings(settings)
    }
}
