//! DialogAgent：自然语言理解与回复生成
//!
//! 三个操作都由一次 LLM 调用支撑，对状态无副作用；
//! 调用失败或超时统一为 ServiceUnavailable，由编排器降级处理。

use std::sync::Arc;

use tracing::debug;

use crate::core::AgentError;
use crate::dialog::intent::decode_intent_result;
use crate::dialog::{Intent, IntentResult, PromptSet};
use crate::llm::{LlmClient, LlmError, Message, Role};
use crate::state::DialogMessage;
use crate::tools::ToolResult;

/// 意图理解时附带的最近历史条数（完整历史永远不进提示词）
const HISTORY_WINDOW: usize = 6;

pub struct DialogAgent {
    llm: Arc<dyn LlmClient>,
    prompts: PromptSet,
}

impl DialogAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptSet) -> Self {
        Self { llm, prompts }
    }

    /// 理解用户意图；输出在 LLM 边界被严格解码为 IntentResult
    pub async fn understand_intent(
        &self,
        text: &str,
        recent_history: &[DialogMessage],
    ) -> Result<IntentResult, AgentError> {
        let mut messages = vec![Message::system(self.prompts.intent_system.clone())];

        let window_start = recent_history.len().saturating_sub(HISTORY_WINDOW);
        for m in &recent_history[window_start..] {
            messages.push(match m.role {
                Role::Assistant => Message::assistant(m.text.clone()),
                _ => Message::user(m.text.clone()),
            });
        }
        messages.push(Message::user(text.to_string()));

        let output = self.llm.complete(&messages).await.map_err(map_llm_err)?;
        debug!(raw = %output, "intent output");

        decode_intent_result(&output)
    }

    /// 基于工具执行结果生成自然语言回复（成功确认 / 失败致歉）
    pub async fn format_response(
        &self,
        intent: Intent,
        tool_name: &str,
        tool_result: &ToolResult,
    ) -> Result<String, AgentError> {
        let input = serde_json::json!({
            "intent": intent.as_str(),
            "tool_name": tool_name,
            "success": tool_result.success,
            "data": tool_result.data,
            "error": tool_result.error,
        });

        let messages = vec![
            Message::system(self.prompts.response_system.clone()),
            Message::user(input.to_string()),
        ];

        let reply = self.llm.complete(&messages).await.map_err(map_llm_err)?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AgentError::ServiceUnavailable("empty reply".to_string()));
        }
        Ok(reply.to_string())
    }

    /// noop 分支的简单回复（直接透传）
    pub fn format_simple_response(&self, message: &str) -> String {
        message.to_string()
    }

    /// 不经 LLM 的兜底回复：失败时是致歉文案，绝不包含原始错误载荷
    pub fn fallback_reply(&self, tool_name: &str, tool_result: &ToolResult) -> String {
        if tool_result.success {
            format!("Done: {tool_name} completed.")
        } else {
            "Sorry, I couldn't complete that action right now. Please try again.".to_string()
        }
    }

    /// 把较旧的对话历史压缩为摘要（语义优化层调用）
    pub async fn summarize_history(
        &self,
        history: &[DialogMessage],
        prior_summary: &str,
    ) -> Result<String, AgentError> {
        let dialog_text = history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                };
                format!("{role}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let input = format!("Earlier summary:\n{prior_summary}\n\nDialog:\n{dialog_text}");

        let messages = vec![
            Message::system(self.prompts.summary_system.clone()),
            Message::user(input),
        ];

        let summary = self.llm.complete(&messages).await.map_err(map_llm_err)?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AgentError::ServiceUnavailable("empty summary".to_string()));
        }
        Ok(summary.to_string())
    }
}

fn map_llm_err(e: LlmError) -> AgentError {
    AgentError::ServiceUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn agent_with(mock: MockLlmClient) -> DialogAgent {
        DialogAgent::new(Arc::new(mock), PromptSet::default())
    }

    #[tokio::test]
    async fn test_understand_intent_decodes_scripted_json() {
        let mock = MockLlmClient::with_responses(vec![
            r#"{"intent": "create_task", "entities": ["купить молоко"]}"#,
        ]);
        let agent = agent_with(mock);

        let result = agent
            .understand_intent("Создай задачу купить молоко", &[])
            .await
            .unwrap();
        assert_eq!(result.intent, Intent::CreateTask);
        assert_eq!(result.entities, vec!["купить молоко".to_string()]);
    }

    #[tokio::test]
    async fn test_understand_intent_llm_failure_is_service_unavailable() {
        let agent = agent_with(MockLlmClient::failing());
        let err = agent.understand_intent("Привет", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_format_response_passes_through_llm_text() {
        let mock = MockLlmClient::with_responses(vec!["Задача создана!"]);
        let agent = agent_with(mock);

        let reply = agent
            .format_response(
                Intent::CreateTask,
                "create_task",
                &ToolResult::ok(serde_json::json!({"task_id": "t_1"})),
            )
            .await
            .unwrap();
        assert_eq!(reply, "Задача создана!");
    }

    #[test]
    fn test_fallback_reply_never_leaks_errors() {
        let agent = agent_with(MockLlmClient::new());
        let failed = ToolResult::fail("connect ECONNREFUSED 10.0.0.3:5432");
        let reply = agent.fallback_reply("create_task", &failed);
        assert!(!reply.contains("ECONNREFUSED"));
        assert!(reply.to_lowercase().contains("sorry"));
    }

    #[tokio::test]
    async fn test_summarize_history_uses_prior_summary() {
        let mock = MockLlmClient::with_responses(vec!["Обсуждали задачи по дому."]);
        let agent = agent_with(mock);

        let history = vec![DialogMessage::new(Role::User, "Создай задачу убрать кухню")];
        let summary = agent
            .summarize_history(&history, "старый итог")
            .await
            .unwrap();
        assert_eq!(summary, "Обсуждали задачи по дому.");
    }
}
