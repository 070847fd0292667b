//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MANTIS__*` 覆盖（双下划线表示嵌套，
//! 如 `MANTIS__LLM__MODEL=gpt-4.1-mini`）。所有优化阈值都是配置项而非常量。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmSection,
    pub state: StateSection,
    pub tools: ToolsSection,
    pub session: SessionSection,
}

/// [llm] 段：模型、端点与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 对话理解 / 回复生成使用的模型
    #[serde(default = "default_dialog_model")]
    pub dialog_model: String,
    /// 行动决策使用的模型（通常更轻量）
    #[serde(default = "default_decision_model")]
    pub decision_model: String,
    pub base_url: Option<String>,
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            dialog_model: default_dialog_model(),
            decision_model: default_decision_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_dialog_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_decision_model() -> String {
    "gpt-4.1-nano".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// [state] 段：状态边界与优化阈值
///
/// 语义压缩的触发阈值（30 条 / 2000 token）沿用来源系统的启发式取值，
/// 未经独立论证，因此全部暴露为配置项以便调参。
#[derive(Debug, Clone, Deserialize)]
pub struct StateSection {
    /// dialog_history 硬上限
    #[serde(default = "default_max_dialog_history")]
    pub max_dialog_history: usize,
    /// recent_actions 上限
    #[serde(default = "default_max_recent_actions")]
    pub max_recent_actions: usize,
    /// current_tasks 上限
    #[serde(default = "default_max_current_tasks")]
    pub max_current_tasks: usize,
    /// 相关性筛选返回的任务数
    #[serde(default = "default_relevance_top_k")]
    pub relevance_top_k: usize,
    /// 语义压缩触发：历史条数阈值
    #[serde(default = "default_semantic_history_threshold")]
    pub semantic_history_threshold: usize,
    /// 语义压缩触发：估算 token 阈值
    #[serde(default = "default_semantic_token_threshold")]
    pub semantic_token_threshold: usize,
    /// 语义压缩后保留的最近消息数
    #[serde(default = "default_compact_keep_recent")]
    pub compact_keep_recent: usize,
    /// 状态记录 TTL（秒），过期视为不存在
    #[serde(default = "default_state_ttl")]
    pub ttl_secs: u64,
    /// SQLite 状态库路径，未设置时仅可用内存存储
    pub db_path: Option<PathBuf>,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            max_dialog_history: default_max_dialog_history(),
            max_recent_actions: default_max_recent_actions(),
            max_current_tasks: default_max_current_tasks(),
            relevance_top_k: default_relevance_top_k(),
            semantic_history_threshold: default_semantic_history_threshold(),
            semantic_token_threshold: default_semantic_token_threshold(),
            compact_keep_recent: default_compact_keep_recent(),
            ttl_secs: default_state_ttl(),
            db_path: None,
        }
    }
}

fn default_max_dialog_history() -> usize {
    50
}

fn default_max_recent_actions() -> usize {
    10
}

fn default_max_current_tasks() -> usize {
    20
}

fn default_relevance_top_k() -> usize {
    5
}

fn default_semantic_history_threshold() -> usize {
    30
}

fn default_semantic_token_threshold() -> usize {
    2000
}

fn default_compact_keep_recent() -> usize {
    10
}

fn default_state_ttl() -> u64 {
    86400
}

/// [tools] 段：工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [session] 段：空闲会话回收
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// 用户锁空闲多久后可被回收（秒）
    #[serde(default = "default_session_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_session_idle_timeout(),
        }
    }
}

fn default_session_idle_timeout() -> u64 {
    3600
}

/// 从 config 目录加载配置，环境变量 MANTIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MANTIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AgentConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MANTIS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder
        .build()
        .map_err(|e| AgentError::Config(e.to_string()))?;
    c.try_deserialize()
        .map_err(|e| AgentError::Config(e.to_string()))
}
