//! Session bookkeeping.
//!
//! The registry is the single source of truth for which personas are
//! running. Each registration gets a fresh epoch, and a loop keeps running
//! only while the registry still holds its own epoch. A stop followed by a
//! quick restart therefore never revives the old loop.

use crate::persona::Persona;
use crate::renderer::RenderContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Upper bound for the consecutive generation failure counter.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Registry slot for one persona.
pub struct SessionEntry {
    pub epoch: u64,
    pub persona_name: String,
    /// `None` while the browser is still launching.
    pub context: Option<Arc<dyn RenderContext>>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    next_epoch: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the slot for `persona_id`. Returns `None` if it is taken.
    pub fn reserve(&self, persona_id: &str, persona_name: &str) -> Option<u64> {
        let mut sessions = self.lock();
        if sessions.contains_key(persona_id) {
            return None;
        }
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        sessions.insert(
            persona_id.to_string(),
            SessionEntry {
                epoch,
                persona_name: persona_name.to_string(),
                context: None,
            },
        );
        Some(epoch)
    }

    /// Store the launched context. Returns false if the slot was released
    /// or re-registered while the browser was starting.
    pub fn attach(&self, persona_id: &str, epoch: u64, context: Arc<dyn RenderContext>) -> bool {
        match self.lock().get_mut(persona_id) {
            Some(entry) if entry.epoch == epoch => {
                entry.context = Some(context);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, persona_id: &str, epoch: u64) -> bool {
        self.lock()
            .get(persona_id)
            .is_some_and(|entry| entry.epoch == epoch)
    }

    pub fn contains(&self, persona_id: &str) -> bool {
        self.lock().contains_key(persona_id)
    }

    pub fn remove(&self, persona_id: &str) -> Option<SessionEntry> {
        self.lock().remove(persona_id)
    }

    /// Remove the slot only if it still belongs to `epoch`.
    pub fn remove_if_current(&self, persona_id: &str, epoch: u64) -> Option<SessionEntry> {
        let mut sessions = self.lock();
        if sessions.get(persona_id).is_some_and(|e| e.epoch == epoch) {
            sessions.remove(persona_id)
        } else {
            None
        }
    }

    /// Sorted ids of registered personas.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loop-local state of one running session.
pub struct Session {
    pub persona: Persona,
    pub epoch: u64,
    pub context: Arc<dyn RenderContext>,
    consecutive_failures: u32,
}

impl Session {
    pub fn new(persona: Persona, epoch: u64, context: Arc<dyn RenderContext>) -> Self {
        Self {
            persona,
            epoch,
            context,
            consecutive_failures: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.persona.id
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// The provider came back empty.
    pub fn record_empty_generation(&mut self) {
        self.consecutive_failures = (self.consecutive_failures + 1).min(MAX_CONSECUTIVE_FAILURES);
    }

    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }
}
