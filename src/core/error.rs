//! Agent 错误类型
//!
//! 所有失败都是回合级的：任何一个变体都不会让宿主进程崩溃，
//! 编排器将其降级为用户可见的兜底回复。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（LLM、解析、工具、存储等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM 调用传输失败或超时（理解失败的来源）
    #[error("LLM service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// 模型提议了未注册的工具名
    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    /// 状态存储读写失败（写失败会重试一次后才上浮）
    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Config error: {0}")]
    Config(String),
}
