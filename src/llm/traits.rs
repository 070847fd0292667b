//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient::complete；
//! TimedLlmClient 为任意实现叠加统一超时，超时等同于传输失败。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// LLM 调用失败：传输错误或超时，上层统一映射为 ServiceUnavailable
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("empty response")]
    EmptyResponse,
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

/// 超时包装：内部客户端超过 timeout 未返回即视为 LlmError::Timeout
pub struct TimedLlmClient {
    inner: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TimedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl LlmClient for TimedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(messages)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_client_times_out() {
        let timed = TimedLlmClient::new(Arc::new(SlowClient), 1);
        let result = timed.complete(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LlmError::Timeout)));
    }
}
