//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本顺序返回预置回复，耗尽后回显最后一条 User 消息；
//! failing() 模式每次调用都返回传输错误，用于验证兜底路径。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：预置回复队列或恒定失败
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    always_fail: bool,
}

impl MockLlmClient {
    /// 回显模式：无脚本时回显用户最后一条消息
    pub fn new() -> Self {
        Self::default()
    }

    /// 脚本模式：依次返回给定回复
    pub fn with_responses(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            always_fail: false,
        }
    }

    /// 失败模式：每次调用返回 Transport 错误
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            always_fail: true,
        }
    }

    /// 追加一条脚本回复
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.always_fail {
            return Err(LlmError::Transport("mock transport failure".to_string()));
        }

        if let Some(scripted) = self.responses.lock().unwrap().pop_front() {
            return Ok(scripted);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }
}
