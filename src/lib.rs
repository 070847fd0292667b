//! Mantis - 对话式任务管理 Agent 核心
//!
//! 将聊天平台的自由文本消息转换为结构化动作（创建 / 更新 / 查询任务），
//! 核心是按用户有状态的编排循环：意图理解 → 上下文优化 → 行动决策 → 工具执行 → 回复生成。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量），所有阈值均可调
//! - **core**: 错误类型（贯穿全部模块的 AgentError）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、超时包装
//! - **state**: 按用户状态模型、三层优化（结构 / 语义 / 相关性）、持久化存储
//! - **dialog**: 意图理解与回复生成（LLM 输出严格解码为封闭枚举）
//! - **decision**: 行动决策（propose/validate 两段式，LLM 仅为不可信的提议者）
//! - **tools**: 工具 trait、注册表、带超时的统一调用边界
//! - **observability**: tracing 初始化
//! - **session**: 按用户串行化的回合编排器（handle_turn）

pub mod config;
pub mod core;
pub mod decision;
pub mod dialog;
pub mod llm;
pub mod observability;
pub mod session;
pub mod state;
pub mod tools;

pub use config::AgentConfig;
pub use core::AgentError;
pub use session::{build_registry, AgentSession, SessionRegistry};
