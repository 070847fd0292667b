//! 运行时装配
//!
//! 把配置翻译成一套可用的 SessionRegistry：对话与决策各一个 LLM 客户端
//! （统一加超时包装）、状态存储（配置了 db_path 用 SQLite，否则内存）、
//! 任务工具与按用户串行化的会话入口。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AgentConfig;
use crate::core::AgentError;
use crate::decision::DecisionEngine;
use crate::dialog::{DialogAgent, PromptSet};
use crate::llm::{LlmClient, OpenAiClient, TimedLlmClient};
use crate::session::{AgentSession, SessionRegistry};
use crate::state::{MemoryStateStore, SqliteStateStore, StateManager, StateStore};
use crate::tools::{register_task_tools, InMemoryTaskService, ToolInvoker, ToolRegistry};

/// 用配置里的模型名构建一个带超时的 OpenAI 兼容客户端
fn timed_openai(cfg: &AgentConfig, model: &str) -> Arc<dyn LlmClient> {
    let client = OpenAiClient::new(cfg.llm.base_url.as_deref(), model, None);
    Arc::new(TimedLlmClient::new(
        Arc::new(client),
        cfg.llm.request_timeout_secs,
    ))
}

/// 从配置装配完整运行时
pub async fn build_registry(cfg: &AgentConfig) -> Result<SessionRegistry, AgentError> {
    let dialog_llm = timed_openai(cfg, &cfg.llm.dialog_model);
    let decision_llm = timed_openai(cfg, &cfg.llm.decision_model);
    build_registry_with(cfg, dialog_llm, decision_llm).await
}

/// 装配运行时，LLM 客户端由调用方提供（测试里传 Mock）
pub async fn build_registry_with(
    cfg: &AgentConfig,
    dialog_llm: Arc<dyn LlmClient>,
    decision_llm: Arc<dyn LlmClient>,
) -> Result<SessionRegistry, AgentError> {
    let store: Arc<dyn StateStore> = match cfg.state.db_path {
        Some(ref path) => Arc::new(SqliteStateStore::new(path, cfg.state.ttl_secs).await?),
        None => Arc::new(MemoryStateStore::new(cfg.state.ttl_secs)),
    };

    let mut registry = ToolRegistry::new();
    register_task_tools(&mut registry, Arc::new(InMemoryTaskService::new()));
    let invoker = ToolInvoker::new(
        Arc::new(registry),
        Duration::from_secs(cfg.tools.tool_timeout_secs),
    );

    let session = AgentSession::new(
        DialogAgent::new(dialog_llm, PromptSet::default()),
        DecisionEngine::new(decision_llm),
        StateManager::new(cfg.state.clone()),
        store,
        invoker,
    );

    Ok(SessionRegistry::new(
        Arc::new(session),
        Duration::from_secs(cfg.session.idle_timeout_secs),
    ))
}
