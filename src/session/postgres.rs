//! PostgreSQL session store.
//!
//! Requires the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! pmflow = { features = ["postgres"] }
//! ```

#[cfg(feature = "postgres")]
mod inner {
    use async_trait::async_trait;
    use serde_json::Value;
    use sqlx::PgPool;

    use crate::session::{SessionStore, SessionStoreError};

    /// One JSONB row per (session_id, key).
    #[derive(Debug, Clone)]
    pub struct PgSessionStore {
        pool: PgPool,
    }

    impl PgSessionStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        pub async fn connect(database_url: &str) -> Result<Self, SessionStoreError> {
            let pool = PgPool::connect(database_url).await?;
            let store = Self::new(pool);
            store.migrate().await?;
            Ok(store)
        }

        /// Create the session_state table if needed.
        pub async fn migrate(&self) -> Result<(), SessionStoreError> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS session_state (
                    session_id TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value JSONB NOT NULL DEFAULT 'null'::jsonb,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (session_id, key)
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            log::debug!("session_state table migrated");
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for PgSessionStore {
        async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionStoreError> {
            let row: Option<(Value,)> =
                sqlx::query_as("SELECT value FROM session_state WHERE session_id = $1 AND key = $2")
                    .bind(session_id)
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.map(|(v,)| v))
        }

        async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionStoreError> {
            sqlx::query(
                r#"
                INSERT INTO session_state (session_id, key, value, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (session_id, key) DO UPDATE SET
                    value = EXCLUDED.value,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(session_id)
            .bind(key)
            .bind(&value)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;

            Ok(())
        }
    }
}

#[cfg(feature = "postgres")]
pub use inner::*;
