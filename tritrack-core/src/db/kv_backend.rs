//! SQLite key-value storage backend
//!
//! Keeps the state document under a fixed key of a `kv` table, the way a
//! browser keeps it in local storage. Older releases stored the document
//! under other keys; those are still read (never written) so existing
//! boards carry over on the first save.

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{BackendType, StateBackend};

/// Key the current document is stored under
pub const STATE_KEY: &str = "tritrack-state-v2";

/// Keys used by earlier releases, consulted in order when [`STATE_KEY`] is absent
pub const LEGACY_STATE_KEYS: &[&str] = &["tritrack-state", "requirement-tracker-state"];

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);";

/// SQLite key-value backend implementation
pub struct KvBackend {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl KvBackend {
    /// Opens (or creates) the key-value database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open key-value store: {:?}", path))?;
        Self::init(Some(path), conn)
    }

    /// Creates a process-local store that disappears with the backend
    pub fn in_memory() -> Result<Self> {
        Self::init(None, Connection::open_in_memory()?)
    }

    fn init(path: Option<PathBuf>, conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize key-value schema")?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Key-value connection lock poisoned"))
    }

    /// Reads the raw value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Stores `value` under `key`, replacing any previous value
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl StateBackend for KvBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Kv
    }

    fn location(&self) -> String {
        let db = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());
        format!("{}#{}", db, STATE_KEY)
    }

    fn read_document(&self) -> Result<Option<String>> {
        for key in std::iter::once(&STATE_KEY).chain(LEGACY_STATE_KEYS) {
            if let Some(value) = self.get(key)?.filter(|v| !v.is_empty()) {
                if *key != STATE_KEY {
                    log::debug!("Read state from legacy key {}", key);
                }
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        self.set(STATE_KEY, contents)
    }
}
