//! SQLite-backed session store.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{SessionStore, SessionStoreError};

/// Default database file, relative to the working directory.
pub const DEFAULT_SQLITE_PATH: &str = "pmflow_sessions.db";

/// One row per (session_id, key), overwritten on every write.
#[derive(Debug)]
pub struct SqliteSessionStore {
    pub db_path: String,
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: impl Into<String>) -> Result<Self, SessionStoreError> {
        let path = db_path.into();

        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SessionStoreError::Unavailable(format!("{}: {}", path, e)))?;
            }
        }

        let conn = Connection::open(&path)?;
        let store = Self {
            db_path: path,
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Volatile database, mostly for tests.
    pub fn in_memory() -> Result<Self, SessionStoreError> {
        let store = Self {
            db_path: ":memory:".to_string(),
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_db()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SessionStoreError> {
        self.conn
            .lock()
            .map_err(|e| SessionStoreError::Unavailable(format!("Failed to acquire database lock: {}", e)))
    }

    fn init_db(&self) -> Result<(), SessionStoreError> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_state (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value_json TEXT NOT NULL,
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (session_id, key)
            )",
            [],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionStoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM session_state WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json_str) => Ok(Some(serde_json::from_str(&json_str)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionStoreError> {
        let value_json = serde_json::to_string(&value)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session_state (session_id, key, value_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (session_id, key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![session_id, key, value_json, now],
        )?;

        log::debug!("SqliteSessionStore::set: session_id={}, key={}", session_id, key);
        Ok(())
    }
}
