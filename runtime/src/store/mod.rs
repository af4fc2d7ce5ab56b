//! Persistent key/value store and the shared state handle built on it.
//!
//! Personas, settings and metrics are stored as JSON documents under fixed
//! keys in a single SQLite table. Several processes may share one file, so
//! read-modify-write updates go through [`KvStore::update_json`], which runs
//! inside one immediate transaction.

pub mod settings;
pub mod state;

pub use settings::Settings;
pub use state::SharedState;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const PERSONAS_KEY: &str = "personas";
pub const SETTINGS_KEY: &str = "settings";
pub const METRICS_KEY: &str = "metrics";

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON documents keyed by name, backed by SQLite.
pub struct KvStore {
    db: Mutex<Connection>,
}

impl KvStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        Self::init(db)
    }

    /// A throwaway store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.busy_timeout(BUSY_TIMEOUT)?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .context("failed to create documents table")?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Read and decode the document at `key`, if present.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = {
            let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
            db.query_row(
                "SELECT value FROM documents WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?
        };

        raw.map(|raw| {
            serde_json::from_str(&raw).with_context(|| format!("corrupt document '{key}'"))
        })
        .transpose()
    }

    /// Encode and write `value` at `key`, replacing any previous document.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        db.execute(
            "INSERT OR REPLACE INTO documents (key, value, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            rusqlite::params![key, raw],
        )?;
        Ok(())
    }

    /// Apply `update` to the document at `key` and write it back atomically.
    ///
    /// A missing document starts from `T::default()`. Returns the value as
    /// written.
    pub fn update_json<T, F>(&self, key: &str, update: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let mut db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw: Option<String> = tx
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        let mut value = match raw {
            Some(raw) => serde_json::from_str(&raw).with_context(|| format!("corrupt document '{key}'"))?,
            None => T::default(),
        };
        update(&mut value);
        tx.execute(
            "INSERT OR REPLACE INTO documents (key, value, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            rusqlite::params![key, serde_json::to_string(&value)?],
        )?;
        tx.commit()?;
        Ok(value)
    }

    /// Remove the document at `key`. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        let rows = db.execute("DELETE FROM documents WHERE key = ?1", rusqlite::params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/fogcover.db");

        {
            let store = KvStore::open(&path).unwrap();
            store.set_json("settings", &Settings::default()).unwrap();
        }

        let store = KvStore::open(&path).unwrap();
        let settings: Option<Settings> = store.get_json("settings").unwrap();
        assert_eq!(settings, Some(Settings::default()));
    }

    #[test]
    fn test_missing_and_deleted_keys() {
        let store = KvStore::open_in_memory().unwrap();
        assert!(store.get_json::<Settings>("nope").unwrap().is_none());

        store.set_json("k", &vec![1, 2, 3]).unwrap();
        store.set_json("k", &vec![4]).unwrap();
        assert_eq!(store.get_json::<Vec<i32>>("k").unwrap(), Some(vec![4]));

        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
    }

    #[test]
    fn test_update_sees_writes_from_another_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fogcover.db");
        let first = KvStore::open(&path).unwrap();
        let second = KvStore::open(&path).unwrap();

        let counted: u32 = first.update_json("count", |n: &mut u32| *n += 1).unwrap();
        assert_eq!(counted, 1);
        let counted: u32 = second.update_json("count", |n: &mut u32| *n += 1).unwrap();
        assert_eq!(counted, 2);
        assert_eq!(first.get_json::<u32>("count").unwrap(), Some(2));
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let store = KvStore::open_in_memory().unwrap();
        store.set_json("k", &"just a string").unwrap();
        assert!(store.get_json::<Vec<i32>>("k").is_err());
    }
}
