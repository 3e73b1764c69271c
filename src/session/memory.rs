//! Process-local session store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{SessionStore, SessionStoreError};

/// Map-backed store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (session, key) pairs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionStoreError> {
        Ok(self
            .entries
            .read()
            .get(&(session_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionStoreError> {
        self.entries
            .write()
            .insert((session_id.to_string(), key.to_string()), value);
        Ok(())
    }
}
