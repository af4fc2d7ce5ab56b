//! JSONL activity log: append-only record of every session event.

use crate::runner::events::ActivityEvent;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

/// Append-only JSONL activity logger.
pub struct ActivityLog {
    file: File,
}

impl ActivityLog {
    /// Open or create the activity log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open activity log: {}", path.display()))?;

        Ok(Self { file })
    }

    /// Append one event.
    pub fn log(&mut self, event: &ActivityEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}")?;
        Ok(())
    }

    /// Write every event from `rx` until the channel closes.
    pub fn spawn(mut self, mut rx: broadcast::Receiver<ActivityEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.log(&event) {
                            warn!("failed to write activity log: {e}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("activity log fell behind, {skipped} events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// The last `limit` events in the log at `path`. Unreadable lines are skipped.
pub fn read_recent(path: &Path, limit: usize) -> Result<Vec<ActivityEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)
        .with_context(|| format!("failed to open activity log: {}", path.display()))?;
    let events: Vec<ActivityEvent> = BufReader::new(file)
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect();
    let skip = events.len().saturating_sub(limit);
    Ok(events.into_iter().skip(skip).collect())
}
