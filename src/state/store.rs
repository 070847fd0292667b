//! 状态存储：跨进程共享的唯一持久化边界
//!
//! get 对不存在的用户返回 None（调用方落到规范空状态），put 整条覆盖写入。
//! 记录带 TTL：过期视为不存在（沿用来源系统 24h 过期的行为）。
//! 内存实现用于测试与单进程部署，SQLite 实现用于跨 worker 共享。

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::RwLock;

use crate::core::AgentError;
use crate::state::UserState;

/// 状态存储接口：get(user_id) / put(user_id, state)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 读取用户状态；不存在或已过期返回 None
    async fn get(&self, user_id: &str) -> Result<Option<UserState>, AgentError>;

    /// 整条写入用户状态（已由优化保证有界）
    async fn put(&self, user_id: &str, state: &UserState) -> Result<(), AgentError>;
}

/// 内存状态存储（RwLock Map + 访问时惰性过期）
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    ttl: Duration,
}

struct StoredEntry {
    state: UserState,
    stored_at: Instant,
}

impl MemoryStateStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserState>, AgentError> {
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                Ok(Some(entry.state.clone()))
            }
            Some(_) => {
                entries.remove(user_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, user_id: &str, state: &UserState) -> Result<(), AgentError> {
        self.entries.write().await.insert(
            user_id.to_string(),
            StoredEntry {
                state: state.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}

/// SQLite 状态存储：每用户一行 JSON（INSERT OR REPLACE），expires_at 过期视为不存在
pub struct SqliteStateStore {
    pool: SqlitePool,
    ttl_secs: i64,
}

impl SqliteStateStore {
    pub async fn new(db_path: impl AsRef<Path>, ttl_secs: u64) -> Result<Self, AgentError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(3)
            .connect(&db_url)
            .await
            .map_err(|e| AgentError::StateStore(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_state (
                user_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AgentError::StateStore(e.to_string()))?;

        Ok(Self {
            pool,
            ttl_secs: ttl_secs as i64,
        })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserState>, AgentError> {
        let row = sqlx::query("SELECT state, expires_at FROM agent_state WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AgentError::StateStore(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: i64 = row.get("expires_at");
        let now = chrono::Utc::now().timestamp();
        if expires_at < now {
            // 过期行等同于不存在；顺手清掉
            let _ = sqlx::query("DELETE FROM agent_state WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await;
            return Ok(None);
        }

        let raw: String = row.get("state");
        let state =
            serde_json::from_str(&raw).map_err(|e| AgentError::StateStore(e.to_string()))?;
        Ok(Some(state))
    }

    async fn put(&self, user_id: &str, state: &UserState) -> Result<(), AgentError> {
        let raw =
            serde_json::to_string(state).map_err(|e| AgentError::StateStore(e.to_string()))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT OR REPLACE INTO agent_state (user_id, state, updated_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&raw)
        .bind(now)
        .bind(now + self.ttl_secs)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::StateStore(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new(60);
        assert!(store.get("u1").await.unwrap().is_none());

        let state = UserState::empty("u1");
        store.put("u1", &state).await.unwrap();
        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
    }

    #[tokio::test]
    async fn test_memory_store_ttl_expiry() {
        // ttl = 0：写入后立即过期
        let store = MemoryStateStore::new(0);
        store.put("u1", &UserState::empty("u1")).await.unwrap();
        assert!(store.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStateStore::new(dir.path().join("state.db"), 3600)
            .await
            .unwrap();

        assert!(store.get("u1").await.unwrap().is_none());

        let mut state = UserState::empty("u1");
        state.dialog_summary = "итог".to_string();
        store.put("u1", &state).await.unwrap();

        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.dialog_summary, "итог");

        // 覆盖写入
        state.metadata.total_turns = 3;
        store.put("u1", &state).await.unwrap();
        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.metadata.total_turns, 3);
    }

    #[tokio::test]
    async fn test_sqlite_store_expired_row_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStateStore::new(dir.path().join("state.db"), 0)
            .await
            .unwrap();

        store.put("u1", &UserState::empty("u1")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(store.get("u1").await.unwrap().is_none());
    }
}
