//! Conversation history store.
//!
//! The pipeline treats history as an opaque, append-only sequence read once
//! and written once per turn, keyed by conversation + participant. The store
//! boundary is `get`/`set`; retention is the store's concern, not the
//! pipeline's.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tokio::sync::RwLock;

use crate::core::errors::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl TurnRecord {
    pub fn now(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Ordered prior turns for a conversation key; empty when none exist.
    async fn get(&self, key: &str) -> Result<Vec<TurnRecord>, PipelineError>;

    /// Replaces the stored sequence for a key.
    async fn set(&self, key: &str, turns: &[TurnRecord]) -> Result<(), PipelineError>;

    /// Total stored message count across all conversations.
    async fn message_count(&self) -> Result<i64, PipelineError>;
}

#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, PipelineError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::History(format!("Failed to create db dir: {}", e)))?;
        }

        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| PipelineError::History(format!("Failed to connect to history db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_key TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| PipelineError::History(format!("Failed to init messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_key \
             ON messages(conversation_key)",
        )
        .execute(&pool)
        .await
        .map_err(|e| PipelineError::History(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn get(&self, key: &str) -> Result<Vec<TurnRecord>, PipelineError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM messages \
             WHERE conversation_key = ? ORDER BY id ASC",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::history)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            turns.push(TurnRecord {
                role: row.try_get::<String, _>("role").unwrap_or_default(),
                content: row.try_get::<String, _>("content").unwrap_or_default(),
                created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            });
        }
        Ok(turns)
    }

    async fn set(&self, key: &str, turns: &[TurnRecord]) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::history)?;

        sqlx::query("DELETE FROM messages WHERE conversation_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::history)?;

        for turn in turns {
            sqlx::query(
                "INSERT INTO messages (conversation_key, role, content, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(key)
            .bind(&turn.role)
            .bind(&turn.content)
            .bind(&turn.created_at)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::history)?;
        }

        tx.commit().await.map_err(PipelineError::history)?;
        Ok(())
    }

    async fn message_count(&self) -> Result<i64, PipelineError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get(0))
            .map_err(PipelineError::history)?;
        Ok(count)
    }
}

/// In-memory store used by tests and local development.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, Vec<TurnRecord>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn get(&self, key: &str) -> Result<Vec<TurnRecord>, PipelineError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(key).cloned().unwrap_or_default())
    }

    async fn set(&self, key: &str, turns: &[TurnRecord]) -> Result<(), PipelineError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(key.to_string(), turns.to_vec());
        Ok(())
    }

    async fn message_count(&self) -> Result<i64, PipelineError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.values().map(|v| v.len() as i64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_round_trips_turn_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("history.db"))
            .await
            .unwrap();

        assert!(store.get("conv1:alice").await.unwrap().is_empty());

        let turns = vec![
            TurnRecord::now("user", "hello"),
            TurnRecord::now("assistant", "hi there"),
        ];
        store.set("conv1:alice", &turns).await.unwrap();

        let loaded = store.get("conv1:alice").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].role, "user");
        assert_eq!(loaded[1].content, "hi there");
    }

    #[tokio::test]
    async fn sqlite_set_replaces_previous_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("history.db"))
            .await
            .unwrap();

        store
            .set("k", &[TurnRecord::now("user", "old")])
            .await
            .unwrap();
        store
            .set(
                "k",
                &[
                    TurnRecord::now("user", "old"),
                    TurnRecord::now("assistant", "new"),
                ],
            )
            .await
            .unwrap();

        let loaded = store.get("k").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.message_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sqlite_keys_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("history.db"))
            .await
            .unwrap();

        store
            .set("conv1:a", &[TurnRecord::now("user", "one")])
            .await
            .unwrap();
        store
            .set("conv2:b", &[TurnRecord::now("user", "two")])
            .await
            .unwrap();

        assert_eq!(store.get("conv1:a").await.unwrap()[0].content, "one");
        assert_eq!(store.get("conv2:b").await.unwrap()[0].content, "two");
        assert_eq!(store.message_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryHistoryStore::new();
        store
            .set("k", &[TurnRecord::now("user", "hello")])
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().len(), 1);
        assert_eq!(store.message_count().await.unwrap(), 1);
    }
}
