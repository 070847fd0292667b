//! 状态层：按用户状态模型、三层优化（结构 / 语义 / 相关性）、持久化存储

pub mod manager;
pub mod store;
pub mod tokens;
pub mod user_state;

pub use manager::{OptimizeStats, RelevantContext, StateManager};
pub use store::{MemoryStateStore, SqliteStateStore, StateStore};
pub use tokens::TokenEstimator;
pub use user_state::{
    ActionOutcome, ActionRecord, DialogMessage, StateMetadata, TaskRef, TaskStatus, UserState,
};
