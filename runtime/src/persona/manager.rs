//! Persona CRUD over the key/value store.

use super::types::{Intensity, Persona, Schedule};
use crate::store::{KvStore, PERSONAS_KEY};
use anyhow::{bail, Context, Result};
use std::sync::Arc;

/// Partial persona used for create-or-merge saves.
#[derive(Debug, Clone, Default)]
pub struct PersonaDraft {
    pub id: Option<String>,
    pub name: Option<String>,
    pub interests: Option<Vec<String>>,
    pub schedule: Option<Schedule>,
    pub intensity: Option<Intensity>,
}

/// Reads and writes the persona list.
#[derive(Clone)]
pub struct PersonaManager {
    store: Arc<KvStore>,
}

impl PersonaManager {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    pub fn all(&self) -> Result<Vec<Persona>> {
        Ok(self.store.get_json(PERSONAS_KEY)?.unwrap_or_default())
    }

    pub fn get(&self, id: &str) -> Result<Option<Persona>> {
        Ok(self.all()?.into_iter().find(|p| p.id == id))
    }

    /// Merge `draft` into the persona with the same id, or create a new one.
    ///
    /// New personas get a fresh id and are never created active.
    pub fn save(&self, draft: PersonaDraft) -> Result<Persona> {
        let mut saved = None;
        self.store.update_json(PERSONAS_KEY, |personas: &mut Vec<Persona>| {
            let existing = draft
                .id
                .as_deref()
                .and_then(|id| personas.iter().position(|p| p.id == id));

            let persona = match existing {
                Some(index) => {
                    let persona = &mut personas[index];
                    if let Some(name) = draft.name {
                        persona.name = name;
                    }
                    if let Some(interests) = draft.interests {
                        persona.interests = interests;
                    }
                    if let Some(schedule) = draft.schedule {
                        persona.schedule = schedule;
                    }
                    if let Some(intensity) = draft.intensity {
                        persona.intensity = intensity;
                    }
                    persona.clone()
                }
                None => {
                    let persona = Persona {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: draft.name.unwrap_or_else(|| "New Persona".to_string()),
                        interests: draft.interests.unwrap_or_default(),
                        schedule: draft.schedule.unwrap_or_default(),
                        intensity: draft.intensity.unwrap_or_default(),
                        is_active: false,
                    };
                    personas.push(persona.clone());
                    persona
                }
            };
            saved = Some(persona);
        })?;
        saved.context("persona was not saved")
    }

    /// Remove a persona. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut removed = false;
        self.store.update_json(PERSONAS_KEY, |personas: &mut Vec<Persona>| {
            let before = personas.len();
            personas.retain(|p| p.id != id);
            removed = personas.len() != before;
        })?;
        Ok(removed)
    }

    /// Persist the running flag for one persona.
    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut found = false;
        self.store.update_json(PERSONAS_KEY, |personas: &mut Vec<Persona>| {
            if let Some(persona) = personas.iter_mut().find(|p| p.id == id) {
                persona.is_active = active;
                found = true;
            }
        })?;
        if !found {
            bail!("persona not found: {id}");
        }
        Ok(())
    }

    /// Mark every persona inactive. Returns how many flags changed.
    pub fn clear_active_flags(&self) -> Result<usize> {
        let mut cleared = 0;
        self.store.update_json(PERSONAS_KEY, |personas: &mut Vec<Persona>| {
            for persona in personas.iter_mut().filter(|p| p.is_active) {
                persona.is_active = false;
                cleared += 1;
            }
        })?;
        Ok(cleared)
    }
}
