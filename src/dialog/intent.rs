//! 意图模型
//!
//! 固定枚举的意图集合与 understand_intent 的结果结构；
//! decode_intent_result 在 LLM 边界处把未类型化的 JSON 严格解码为 IntentResult。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::extract_json_block;

/// 识别出的意图类型（封闭集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateTask,
    ListTasks,
    UpdateTask,
    SearchTask,
    GeneralQuestion,
    Greeting,
    Other,
}

impl Intent {
    /// 解析模型返回的意图字符串；未知值归为 Other（模型幻觉不应导致整轮失败）
    pub fn parse_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "create_task" => Intent::CreateTask,
            "list_tasks" => Intent::ListTasks,
            "update_task" => Intent::UpdateTask,
            "search_task" | "search_tasks" => Intent::SearchTask,
            "general_question" => Intent::GeneralQuestion,
            "greeting" => Intent::Greeting,
            _ => Intent::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateTask => "create_task",
            Intent::ListTasks => "list_tasks",
            Intent::UpdateTask => "update_task",
            Intent::SearchTask => "search_task",
            Intent::GeneralQuestion => "general_question",
            Intent::Greeting => "greeting",
            Intent::Other => "other",
        }
    }
}

/// 意图理解结果
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    /// 抽取出的实体（日期、标题、ID、状态），按出现顺序
    pub entities: Vec<String>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
}

impl IntentResult {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            entities: Vec::new(),
            needs_clarification: false,
            clarification_question: None,
        }
    }
}

/// LLM 原始输出的形状（intent 仍是字符串，在 decode 时收窄为枚举）
#[derive(Debug, Deserialize)]
struct RawIntentResult {
    intent: String,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    clarification_question: Option<String>,
}

/// 严格解码 understand_intent 的 LLM 输出
///
/// 不变量：needs_clarification 为 true 时必须带非空 clarification_question，
/// 否则视为无效输出（一个没有问题可问的澄清请求无法推进对话）。
pub fn decode_intent_result(output: &str) -> Result<IntentResult, AgentError> {
    let json = extract_json_block(output)
        .ok_or_else(|| AgentError::JsonParse(format!("no JSON in intent output: {output}")))?;

    let raw: RawIntentResult =
        serde_json::from_str(json).map_err(|e| AgentError::JsonParse(e.to_string()))?;

    let clarification_question = raw
        .clarification_question
        .filter(|q| !q.trim().is_empty());

    if raw.needs_clarification && clarification_question.is_none() {
        return Err(AgentError::JsonParse(
            "needs_clarification without clarification_question".to_string(),
        ));
    }

    Ok(IntentResult {
        intent: Intent::parse_loose(&raw.intent),
        entities: raw.entities,
        needs_clarification: raw.needs_clarification,
        clarification_question,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_create_task() {
        let out = r#"{"intent": "create_task", "entities": ["купить молоко"], "needs_clarification": false}"#;
        let result = decode_intent_result(out).unwrap();
        assert_eq!(result.intent, Intent::CreateTask);
        assert_eq!(result.entities, vec!["купить молоко".to_string()]);
        assert!(!result.needs_clarification);
    }

    #[test]
    fn test_decode_clarification() {
        let out = r#"{"intent": "create_task", "needs_clarification": true, "clarification_question": "Какое название у задачи?"}"#;
        let result = decode_intent_result(out).unwrap();
        assert!(result.needs_clarification);
        assert!(result.clarification_question.unwrap().contains("название"));
    }

    #[test]
    fn test_clarification_without_question_is_invalid() {
        let out = r#"{"intent": "create_task", "needs_clarification": true}"#;
        assert!(decode_intent_result(out).is_err());
    }

    #[test]
    fn test_unknown_intent_maps_to_other() {
        let out = r#"{"intent": "order_pizza"}"#;
        let result = decode_intent_result(out).unwrap();
        assert_eq!(result.intent, Intent::Other);
    }

    #[test]
    fn test_non_json_output_is_error() {
        assert!(decode_intent_result("I think the user wants a task").is_err());
    }

    #[test]
    fn test_fenced_output_decodes() {
        let out = "```json\n{\"intent\": \"greeting\"}\n```";
        assert_eq!(decode_intent_result(out).unwrap().intent, Intent::Greeting);
    }
}
