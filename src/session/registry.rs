//! 按用户的会话串行化
//!
//! 每个用户对应一把异步互斥锁，同一用户的消息严格按到达顺序处理
//! （tokio Mutex 的排队是 FIFO 公平的），不同用户的轮次完全并行。
//! 锁表本身只在取锁/回收时短暂持有，轮次处理不在锁表临界区内。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::session::AgentSession;

struct UserEntry {
    lock: Arc<Mutex<()>>,
    last_used: Instant,
}

pub struct SessionRegistry {
    session: Arc<AgentSession>,
    users: Mutex<HashMap<String, UserEntry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(session: Arc<AgentSession>, idle_timeout: Duration) -> Self {
        Self {
            session,
            users: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// 处理一条用户消息；同一用户并发到达的消息按到达顺序串行执行
    pub async fn handle_message(&self, user_id: &str, text: &str) -> String {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        self.session.handle_turn(user_id, text).await
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut users = self.users.lock().await;
        let entry = users.entry(user_id.to_string()).or_insert_with(|| UserEntry {
            lock: Arc::new(Mutex::new(())),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        entry.lock.clone()
    }

    /// 回收空闲用户的锁条目，返回回收数量
    ///
    /// 只回收没有在途持有者的锁（strong_count == 1），正在排队的用户不受影响。
    pub async fn evict_idle(&self) -> usize {
        let mut users = self.users.lock().await;
        let before = users.len();
        let idle_timeout = self.idle_timeout;
        users.retain(|_, entry| {
            Arc::strong_count(&entry.lock) > 1 || entry.last_used.elapsed() < idle_timeout
        });
        let evicted = before - users.len();
        if evicted > 0 {
            debug!(evicted, "回收空闲会话锁");
        }
        evicted
    }

    /// 当前登记的用户数（测试观察用）
    pub async fn tracked_users(&self) -> usize {
        self.users.lock().await.len()
    }
}
