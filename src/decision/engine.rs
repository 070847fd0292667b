//! DecisionEngine：提议 / 校验两段式决策
//!
//! 提议阶段把意图、相关上下文与工具表交给 LLM；校验阶段对照工具表
//! 拒绝幻觉工具与缺参调用。decide 永远返回一个可执行的 Decision。

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::AgentError;
use crate::decision::schema::{decode_decision, Decision};
use crate::dialog::IntentResult;
use crate::llm::{LlmClient, Message};
use crate::state::RelevantContext;
use crate::tools::ToolSchema;

/// 决策阶段的系统提示词
const DECISION_SYSTEM: &str = "\
You are the action-planning stage of a task management assistant.
Given the user's message, the recognized intent and the relevant state,
choose exactly one action and answer with a single JSON object:
  {\"action_type\": \"tool_call\", \"tool_name\": \"...\", \"tool_arguments\": {...}}
or
  {\"action_type\": \"noop\", \"message\": \"a short reply to the user\"}
Only use tools from the provided tool list and only with their declared
arguments. For greetings and general questions answer with noop.";

/// 决策失败时的安全回复
const SAFE_NOOP_MESSAGE: &str =
    "I couldn't work out what to do with that. Could you rephrase it?";

pub struct DecisionEngine {
    llm: Arc<dyn LlmClient>,
}

impl DecisionEngine {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 决定本轮行动；任何失败都降级为安全 Noop，绝不返回错误
    pub async fn decide(
        &self,
        user_message: &str,
        intent: &IntentResult,
        ctx: &RelevantContext,
        schemas: &[ToolSchema],
    ) -> Decision {
        let input = json!({
            "message": user_message,
            "intent": intent.intent.as_str(),
            "entities": intent.entities,
            "relevant_tasks": ctx.relevant_tasks,
            "recent_actions": ctx.recent_actions,
            "current_context": ctx.current_context,
            "dialog_summary": ctx.dialog_summary,
            "tools": schemas,
        });

        let messages = vec![
            Message::system(DECISION_SYSTEM.to_string()),
            Message::user(input.to_string()),
        ];

        let output = match self.llm.complete(&messages).await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "决策 LLM 调用失败，降级为 noop");
                return safe_noop();
            }
        };
        debug!(raw = %output, "决策输出");

        let decision = match decode_decision(&output) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "决策输出解码失败，降级为 noop");
                return safe_noop();
            }
        };

        match validate(&decision, schemas) {
            Ok(()) => normalize(decision),
            Err(e) => {
                warn!(error = %e, "决策校验失败，降级为 noop");
                safe_noop()
            }
        }
    }
}

fn safe_noop() -> Decision {
    Decision::Noop {
        message: SAFE_NOOP_MESSAGE.to_string(),
    }
}

/// Noop 的空消息替换为安全文案
fn normalize(decision: Decision) -> Decision {
    match decision {
        Decision::Noop { message } if message.trim().is_empty() => safe_noop(),
        other => other,
    }
}

/// 对照工具表校验 ToolCall：工具必须已注册，必填参数必须存在且非 null
fn validate(decision: &Decision, schemas: &[ToolSchema]) -> Result<(), AgentError> {
    let Decision::ToolCall {
        tool_name,
        tool_arguments,
    } = decision
    else {
        return Ok(());
    };

    let schema = schemas
        .iter()
        .find(|s| s.name == *tool_name)
        .ok_or_else(|| AgentError::HallucinatedTool(tool_name.clone()))?;

    for key in &schema.required {
        let present = tool_arguments
            .get(key)
            .map_or(false, |v| !v.is_null() && !is_blank(v));
        if !present {
            return Err(AgentError::JsonParse(format!(
                "工具 {tool_name} 缺少必填参数 {key}"
            )));
        }
    }
    Ok(())
}

fn is_blank(v: &Value) -> bool {
    v.as_str().map_or(false, |s| s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::Intent;
    use crate::llm::MockLlmClient;

    fn schemas() -> Vec<ToolSchema> {
        vec![
            ToolSchema {
                name: "create_task".to_string(),
                description: "создать задачу".to_string(),
                required: vec!["title".to_string()],
            },
            ToolSchema {
                name: "get_user_tasks".to_string(),
                description: "список задач".to_string(),
                required: vec![],
            },
        ]
    }

    fn intent(i: Intent) -> IntentResult {
        IntentResult {
            intent: i,
            entities: vec![],
            needs_clarification: false,
            clarification_question: None,
        }
    }

    fn empty_ctx() -> RelevantContext {
        RelevantContext {
            current_context: Value::Null,
            relevant_tasks: vec![],
            recent_actions: vec![],
            dialog_summary: String::new(),
        }
    }

    async fn decide_with(response: &str) -> Decision {
        let engine = DecisionEngine::new(Arc::new(MockLlmClient::with_responses(vec![response])));
        engine
            .decide(
                "Создай задачу купить молоко",
                &intent(Intent::CreateTask),
                &empty_ctx(),
                &schemas(),
            )
            .await
    }

    #[tokio::test]
    async fn test_valid_tool_call_passes() {
        let d = decide_with(
            r#"{"action_type": "tool_call", "tool_name": "create_task", "tool_arguments": {"title": "купить молоко"}}"#,
        )
        .await;
        assert!(matches!(d, Decision::ToolCall { ref tool_name, .. } if tool_name == "create_task"));
    }

    #[tokio::test]
    async fn test_hallucinated_tool_downgrades_to_noop() {
        let d = decide_with(
            r#"{"action_type": "tool_call", "tool_name": "delete_everything", "tool_arguments": {}}"#,
        )
        .await;
        assert_eq!(d, safe_noop());
    }

    #[tokio::test]
    async fn test_missing_required_arg_downgrades_to_noop() {
        let d = decide_with(
            r#"{"action_type": "tool_call", "tool_name": "create_task", "tool_arguments": {}}"#,
        )
        .await;
        assert_eq!(d, safe_noop());
    }

    #[tokio::test]
    async fn test_blank_required_arg_downgrades_to_noop() {
        let d = decide_with(
            r#"{"action_type": "tool_call", "tool_name": "create_task", "tool_arguments": {"title": "   "}}"#,
        )
        .await;
        assert_eq!(d, safe_noop());
    }

    #[tokio::test]
    async fn test_garbage_output_downgrades_to_noop() {
        let d = decide_with("ничего осмысленного").await;
        assert_eq!(d, safe_noop());
    }

    #[tokio::test]
    async fn test_llm_failure_is_safe_noop() {
        let engine = DecisionEngine::new(Arc::new(MockLlmClient::failing()));
        let d = engine
            .decide(
                "Привет",
                &intent(Intent::Greeting),
                &empty_ctx(),
                &schemas(),
            )
            .await;
        assert_eq!(d, safe_noop());
    }

    #[tokio::test]
    async fn test_empty_noop_message_is_replaced() {
        let d = decide_with(r#"{"action_type": "noop", "message": ""}"#).await;
        assert_eq!(d, safe_noop());
    }
}
