//! 会话层：单轮编排与按用户串行化
//!
//! AgentSession 实现一轮消息的完整协议（加载 → 理解 → 决策 → 执行 →
//! 回复 → 优化 → 持久化）；SessionRegistry 用按用户的锁保证同一用户
//! 的轮次严格串行，不同用户互不阻塞。

pub mod bootstrap;
pub mod registry;
pub mod turn;

pub use bootstrap::{build_registry, build_registry_with};
pub use registry::SessionRegistry;
pub use turn::AgentSession;
