//! Shared state handle passed to every component.
//!
//! The store is the source of truth: other processes (the CLI, a foreground
//! session) write to the same database, so reads refresh from it and fall
//! back to the last known copy when the store cannot be read. Updates run
//! as one store transaction while holding the local lock.

use super::{KvStore, Settings, METRICS_KEY, SETTINGS_KEY};
use crate::metrics::Metrics;
use crate::persona::PersonaManager;
use anyhow::Result;
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

/// Cloneable handle to settings, metrics and the backing store.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

struct StateInner {
    store: Arc<KvStore>,
    settings: RwLock<Settings>,
    metrics: Mutex<Metrics>,
    fallback_api_key: Option<String>,
}

impl SharedState {
    /// Load settings and metrics from `store`, falling back to defaults.
    ///
    /// `fallback_api_key` is used whenever the stored key is empty.
    pub fn load(store: Arc<KvStore>, fallback_api_key: Option<String>) -> Result<Self> {
        let settings = store.get_json::<Settings>(SETTINGS_KEY)?.unwrap_or_default();
        let metrics = store.get_json::<Metrics>(METRICS_KEY)?.unwrap_or_default();
        Ok(Self {
            inner: Arc::new(StateInner {
                store,
                settings: RwLock::new(settings),
                metrics: Mutex::new(metrics),
                fallback_api_key: fallback_api_key.filter(|k| !k.trim().is_empty()),
            }),
        })
    }

    /// Fresh state over an in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::load(Arc::new(KvStore::open_in_memory()?), None)
    }

    pub fn store(&self) -> &Arc<KvStore> {
        &self.inner.store
    }

    pub fn personas(&self) -> PersonaManager {
        PersonaManager::new(Arc::clone(&self.inner.store))
    }

    /// Current settings, re-read from the store.
    pub fn settings(&self) -> Settings {
        let mut cached = self.inner.settings.write().unwrap_or_else(|e| e.into_inner());
        match self.inner.store.get_json::<Settings>(SETTINGS_KEY) {
            Ok(Some(fresh)) => *cached = fresh,
            Ok(None) => {}
            Err(e) => warn!("failed to refresh settings, using last known: {e}"),
        }
        cached.clone()
    }

    pub fn kill_switch(&self) -> bool {
        self.settings().kill_switch
    }

    /// The generation credential: the stored key, else the fallback.
    pub fn api_key(&self) -> Option<String> {
        let stored = self.settings().api_key;
        if stored.trim().is_empty() {
            self.inner.fallback_api_key.clone()
        } else {
            Some(stored)
        }
    }

    /// Replace settings wholesale and persist them.
    pub fn save_settings(&self, settings: Settings) -> Result<Settings> {
        self.update_settings(|current| *current = settings)
    }

    /// Apply `update` to the stored settings and persist, under the write lock.
    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut cached = self.inner.settings.write().unwrap_or_else(|e| e.into_inner());
        let updated = self.inner.store.update_json(SETTINGS_KEY, update)?;
        *cached = updated.clone();
        Ok(updated)
    }

    /// Current metrics, re-read from the store.
    pub fn metrics(&self) -> Metrics {
        let mut cached = self.inner.metrics.lock().unwrap_or_else(|e| e.into_inner());
        match self.inner.store.get_json::<Metrics>(METRICS_KEY) {
            Ok(Some(fresh)) => *cached = fresh,
            Ok(None) => {}
            Err(e) => warn!("failed to refresh metrics, using last known: {e}"),
        }
        cached.clone()
    }

    /// Record one visit against the stored metrics. Persistence failures
    /// are logged and the visit is kept in memory only.
    pub fn record_visit(&self, domain: &str) -> Metrics {
        let mut cached = self.inner.metrics.lock().unwrap_or_else(|e| e.into_inner());
        match self
            .inner
            .store
            .update_json(METRICS_KEY, |metrics: &mut Metrics| metrics.record_visit(domain))
        {
            Ok(updated) => *cached = updated,
            Err(e) => {
                warn!("failed to persist metrics: {e}");
                cached.record_visit(domain);
            }
        }
        cached.clone()
    }
}
