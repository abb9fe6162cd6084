//! Save persistence.
//!
//! RULE: Only store.rs talks to the database. The engine sees a plain
//! string key/value `SaveStore` and never executes SQL.

use crate::error::SimResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// String key/value persistence backend.
pub trait SaveStore {
    fn get(&self, key: &str) -> SimResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> SimResult<()>;
    fn remove(&mut self, key: &str) -> SimResult<()>;
}

pub struct SqliteSaveStore {
    conn: Connection,
}

impl SqliteSaveStore {
    /// Open (or create) the save database at `path` and migrate it.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let store = Self { conn: Connection::open_in_memory()? };
        store.migrate()?;
        Ok(store)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_save_slots.sql"))?;
        Ok(())
    }

    pub fn keys(&self) -> SimResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM save_slot ORDER BY key ASC")?;
        let keys = stmt.query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl SaveStore for SqliteSaveStore {
    fn get(&self, key: &str) -> SimResult<Option<String>> {
        let payload = self.conn.query_row(
            "SELECT payload FROM save_slot WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ).optional()?;
        Ok(payload)
    }

    fn set(&mut self, key: &str, value: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO save_slot (key, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SimResult<()> {
        self.conn.execute("DELETE FROM save_slot WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Process-local store for tests and throwaway runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    slots: BTreeMap<String, String>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SaveStore for MemorySaveStore {
    fn get(&self, key: &str) -> SimResult<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> SimResult<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SimResult<()> {
        self.slots.remove(key);
        Ok(())
    }
}
