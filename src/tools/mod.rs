//! 工具层：Tool trait、注册表与带超时的调用器
//!
//! 工具调用从不向编排器抛错：无论失败原因（未注册、超时、执行出错），
//! 调用器都把它折叠为 ToolResult { success: false }，由对话层转述给用户。

pub mod invoker;
pub mod memory_tasks;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use invoker::ToolInvoker;
pub use memory_tasks::{register_task_tools, InMemoryTaskService};
pub use registry::{ToolRegistry, ToolSchema};

/// 可被决策引擎选中执行的工具
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    /// 给决策提示词看的一句话描述
    fn description(&self) -> &str;
    /// 必填参数名；决策校验与执行入口都据此检查
    fn required_args(&self) -> &[&str];
    /// 执行工具；错误用字符串承载，绝不 panic
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 工具执行的统一结果
#[derive(Clone, Debug, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
