//! 带超时的工具调用器
//!
//! invoke 的返回类型刻意不是 Result：未注册、缺参、超时、执行出错
//! 全部折叠为失败的 ToolResult。每次调用都落一条结构化审计日志。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use crate::tools::{ToolRegistry, ToolResult};

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, tool_name: &str, args: Value) -> ToolResult {
        let started = Instant::now();

        let result = match self.registry.get(tool_name) {
            None => ToolResult::fail(format!("未注册的工具: {tool_name}")),
            Some(tool) => {
                if let Some(missing) = first_missing_arg(tool.required_args(), &args) {
                    ToolResult::fail(format!("缺少必填参数: {missing}"))
                } else {
                    match tokio::time::timeout(self.timeout, tool.execute(args)).await {
                        Err(_) => ToolResult::fail(format!(
                            "工具执行超时（{}s）",
                            self.timeout.as_secs()
                        )),
                        Ok(Err(e)) => ToolResult::fail(e),
                        Ok(Ok(data)) => ToolResult::ok(data),
                    }
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.success {
            info!(tool = tool_name, elapsed_ms, success = true, "工具调用完成");
        } else {
            warn!(
                tool = tool_name,
                elapsed_ms,
                success = false,
                error = result.error.as_deref().unwrap_or(""),
                "工具调用失败"
            );
        }
        result
    }
}

/// 返回第一个缺失或为 null 的必填参数名
fn first_missing_arg<'a>(required: &[&'a str], args: &Value) -> Option<&'a str> {
    required
        .iter()
        .find(|&&key| args.get(key).map_or(true, Value::is_null))
        .copied()
}
