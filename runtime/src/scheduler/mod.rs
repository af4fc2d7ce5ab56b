//! Weekly-window scheduler.
//!
//! Every tick compares each persona's schedule with what the runner is
//! actually doing, then starts or stops sessions to match. The first tick
//! fires immediately.

use crate::persona::Persona;
use crate::store::SharedState;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default reconciliation interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// The session operations the scheduler drives.
#[async_trait]
pub trait SessionControl: Send + Sync {
    async fn start_session(&self, persona: &Persona) -> Result<()>;
    async fn stop_session(&self, persona_id: &str);
    fn is_active(&self, persona_id: &str) -> bool;
}

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub failed: Vec<String>,
    /// Set when the kill switch suppressed the pass.
    pub skipped: bool,
}

pub struct Scheduler {
    control: Arc<dyn SessionControl>,
    state: SharedState,
    interval: Duration,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Scheduler {
    pub fn new(control: Arc<dyn SessionControl>, state: SharedState, interval: Duration) -> Self {
        Self {
            control,
            state,
            interval,
            clock: local_now,
        }
    }

    /// Replace the wall clock used by [`Scheduler::run`].
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Tick until `shutdown` is notified.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!("scheduler running every {}s", self.interval.as_secs());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.check_schedules((self.clock)()).await;
                    debug!(?report, "schedule check");
                }
                _ = shutdown.notified() => {
                    info!("scheduler stopped");
                    return;
                }
            }
        }
    }

    /// One reconciliation pass at wall-clock time `now`.
    pub async fn check_schedules(&self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        if self.state.kill_switch() {
            report.skipped = true;
            return report;
        }

        let personas = match self.state.personas().all() {
            Ok(personas) => personas,
            Err(e) => {
                warn!("failed to load personas: {e}");
                return report;
            }
        };

        for persona in &personas {
            let should_be_active = persona.schedule.is_active_at(now);
            let running = self.control.is_active(&persona.id);

            if should_be_active && !running {
                match self.start(persona).await {
                    Ok(()) => report.started.push(persona.id.clone()),
                    Err(e) => {
                        warn!(persona = %persona.id, "scheduled start failed: {e:#}");
                        report.failed.push(persona.id.clone());
                    }
                }
            } else if !should_be_active && running {
                match self.stop(persona).await {
                    Ok(()) => report.stopped.push(persona.id.clone()),
                    Err(e) => {
                        warn!(persona = %persona.id, "scheduled stop failed: {e:#}");
                        report.failed.push(persona.id.clone());
                    }
                }
            } else if persona.is_active != running {
                // Flag drifted from the registry, e.g. after a crash.
                if let Err(e) = self.state.personas().set_active(&persona.id, running) {
                    warn!(persona = %persona.id, "failed to repair active flag: {e}");
                }
            }
        }
        report
    }

    async fn start(&self, persona: &Persona) -> Result<()> {
        info!(persona = %persona.id, name = %persona.name, "schedule window open, starting");
        self.control.start_session(persona).await?;
        if !self.control.is_active(&persona.id) {
            bail!("session for {} ended while starting", persona.name);
        }
        self.state.personas().set_active(&persona.id, true)
    }

    async fn stop(&self, persona: &Persona) -> Result<()> {
        info!(persona = %persona.id, name = %persona.name, "schedule window closed, stopping");
        self.control.stop_session(&persona.id).await;
        self.state.personas().set_active(&persona.id, false)
    }
}
