//! 决策的数据结构与 LLM 输出解码
//!
//! 解码分两步：先把原始文本提取为未类型化 JSON（RawDecision），
//! 再做结构校验得到封闭的 Decision。参数合法性校验在 engine 里
//! 对照工具表完成。

use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::extract_json_block;

/// 校验通过后的行动决策
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// 调用一个已注册的工具
    ToolCall {
        tool_name: String,
        tool_arguments: Value,
    },
    /// 不调用工具，直接回复
    Noop { message: String },
}

/// LLM 决策输出的原始形态（未校验）
#[derive(Debug, Deserialize)]
struct RawDecision {
    action_type: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_arguments: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// 把 LLM 输出解码为 Decision（不含工具表校验）
///
/// action_type 未知、tool_call 缺工具名、JSON 不合法都视为解码失败。
pub fn decode_decision(output: &str) -> Result<Decision, AgentError> {
    let json = extract_json_block(output)
        .ok_or_else(|| AgentError::JsonParse("决策输出中未找到 JSON".to_string()))?;

    let raw: RawDecision =
        serde_json::from_str(json).map_err(|e| AgentError::JsonParse(e.to_string()))?;

    match raw.action_type.as_str() {
        "tool_call" => {
            let tool_name = raw
                .tool_name
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| AgentError::JsonParse("tool_call 缺少 tool_name".to_string()))?;
            let tool_arguments = raw.tool_arguments.unwrap_or_else(|| Value::Object(Default::default()));
            if !tool_arguments.is_object() {
                return Err(AgentError::JsonParse(
                    "tool_arguments 必须是 JSON 对象".to_string(),
                ));
            }
            Ok(Decision::ToolCall {
                tool_name,
                tool_arguments,
            })
        }
        "noop" | "respond" => Ok(Decision::Noop {
            message: raw.message.unwrap_or_default(),
        }),
        other => Err(AgentError::JsonParse(format!(
            "未知的 action_type: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tool_call() {
        let output = r#"{"action_type": "tool_call", "tool_name": "create_task", "tool_arguments": {"title": "купить молоко"}}"#;
        let d = decode_decision(output).unwrap();
        assert_eq!(
            d,
            Decision::ToolCall {
                tool_name: "create_task".to_string(),
                tool_arguments: serde_json::json!({"title": "купить молоко"}),
            }
        );
    }

    #[test]
    fn test_decode_noop_with_message() {
        let output = r#"{"action_type": "noop", "message": "Привет!"}"#;
        let d = decode_decision(output).unwrap();
        assert_eq!(
            d,
            Decision::Noop {
                message: "Привет!".to_string()
            }
        );
    }

    #[test]
    fn test_decode_from_fenced_block() {
        let output = "Вот решение:\n```json\n{\"action_type\": \"noop\", \"message\": \"ок\"}\n```";
        assert!(matches!(decode_decision(output), Ok(Decision::Noop { .. })));
    }

    #[test]
    fn test_decode_rejects_unknown_action_type() {
        let output = r#"{"action_type": "launch_rocket"}"#;
        assert!(matches!(
            decode_decision(output),
            Err(AgentError::JsonParse(_))
        ));
    }

    #[test]
    fn test_decode_rejects_tool_call_without_name() {
        let output = r#"{"action_type": "tool_call", "tool_arguments": {}}"#;
        assert!(decode_decision(output).is_err());
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(decode_decision("просто текст без JSON").is_err());
    }
}
