//! Session context shared across workflow runs.
//!
//! A session accumulates the latest meeting context and the history of
//! generated tasks. Runs against the same session id read it before the
//! summary step and write it back after the summary and task steps. There
//! is no merging: the last writer wins.

pub mod memory;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::types::{MeetingContext, Task, TaskList};

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

#[cfg(feature = "postgres")]
pub use postgres::PgSessionStore;

/// Key under which the latest meeting context is stored.
pub const MEETING_CONTEXT_KEY: &str = "meeting_context";
/// Key under which the accumulated task history is stored.
pub const TASK_HISTORY_KEY: &str = "task_history";

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value persistence scoped by session id.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionStoreError>;

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionStoreError>;
}

/// Context carried from one run of a session to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    #[serde(default)]
    pub meeting_context: Option<MeetingContext>,
    #[serde(default)]
    pub task_history: Vec<Task>,
    /// Stored history entries that no longer decode. They are written back
    /// ahead of `task_history` so a persist never loses them.
    #[serde(skip)]
    unreadable_history: Vec<Value>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Read the session from `store`.
    ///
    /// An unreadable meeting context is dropped with a warning. History
    /// entries that do not decode are kept aside and written back on persist.
    pub async fn load(store: &dyn SessionStore, session_id: &str) -> Result<Self, SessionStoreError> {
        let mut ctx = Self::new(session_id);

        if let Some(raw) = store.get(session_id, MEETING_CONTEXT_KEY).await? {
            match serde_json::from_value::<MeetingContext>(raw) {
                Ok(mc) => ctx.meeting_context = Some(mc),
                Err(e) => log::warn!("session {}: ignoring unreadable meeting context: {}", session_id, e),
            }
        }

        match store.get(session_id, TASK_HISTORY_KEY).await? {
            Some(Value::Array(entries)) => {
                for entry in entries {
                    match serde_json::from_value::<Task>(entry.clone()) {
                        Ok(task) => ctx.task_history.push(task),
                        Err(e) => {
                            log::warn!("session {}: keeping unreadable history entry as is: {}", session_id, e);
                            ctx.unreadable_history.push(entry);
                        }
                    }
                }
            }
            Some(other) if !other.is_null() => {
                log::warn!("session {}: ignoring task history that is not a list: {}", session_id, other);
            }
            _ => {}
        }

        Ok(ctx)
    }

    /// Prior meeting context as sent to the summary agent, `{}` when absent.
    pub fn previous_context(&self) -> Value {
        match &self.meeting_context {
            Some(mc) => serde_json::to_value(mc).unwrap_or_else(|_| json!({})),
            None => json!({}),
        }
    }

    /// Replace the meeting context wholesale.
    pub fn set_meeting_context(&mut self, context: MeetingContext) {
        self.meeting_context = Some(context);
    }

    /// Stored history entries kept verbatim because they do not decode.
    pub fn unreadable_history(&self) -> &[Value] {
        &self.unreadable_history
    }

    /// Append `tasks` to the history, keeping at most `limit` newest entries.
    ///
    /// Unreadable entries count toward the limit and are the oldest.
    pub fn append_tasks(&mut self, tasks: &TaskList, limit: Option<usize>) {
        self.task_history.extend(tasks.iter().cloned());
        if let Some(limit) = limit {
            let total = self.unreadable_history.len() + self.task_history.len();
            if total > limit {
                let mut excess = total - limit;
                let from_unreadable = excess.min(self.unreadable_history.len());
                self.unreadable_history.drain(..from_unreadable);
                excess -= from_unreadable;
                self.task_history.drain(..excess);
            }
        }
    }

    pub async fn persist_meeting_context(&self, store: &dyn SessionStore) -> Result<(), SessionStoreError> {
        let value = serde_json::to_value(&self.meeting_context)?;
        store.set(&self.session_id, MEETING_CONTEXT_KEY, value).await
    }

    pub async fn persist_task_history(&self, store: &dyn SessionStore) -> Result<(), SessionStoreError> {
        let mut entries = self.unreadable_history.clone();
        for task in &self.task_history {
            entries.push(serde_json::to_value(task)?);
        }
        store.set(&self.session_id, TASK_HISTORY_KEY, Value::Array(entries)).await
    }
}
