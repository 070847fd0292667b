//! 提示词集合
//!
//! 具体文案是外部配置产物，这里只提供可工作的默认值；
//! 部署时可整组替换而不触碰核心逻辑。

/// DialogAgent 使用的 system 提示词（意图理解 / 回复生成 / 历史摘要）
#[derive(Clone, Debug)]
pub struct PromptSet {
    pub intent_system: String,
    pub response_system: String,
    pub summary_system: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            intent_system: DEFAULT_INTENT_SYSTEM.to_string(),
            response_system: DEFAULT_RESPONSE_SYSTEM.to_string(),
            summary_system: DEFAULT_SUMMARY_SYSTEM.to_string(),
        }
    }
}

const DEFAULT_INTENT_SYSTEM: &str = r#"You are an intent classifier for a task-management assistant.
Classify the user's message into exactly one intent:
create_task, list_tasks, update_task, search_task, general_question, greeting, other.

Extract entities (task titles, dates, identifiers, statuses) as plain strings.

If the message lacks information required to act (e.g. "create a task" with no title,
or "mark it done" with no resolvable referent), set needs_clarification to true and
provide a clarification_question in the user's language.

Respond with ONLY a JSON object:
{"intent": "...", "entities": ["..."], "needs_clarification": false, "clarification_question": null}"#;

const DEFAULT_RESPONSE_SYSTEM: &str = r#"You are a friendly task-management assistant.
Given an intent, a tool name and its result, write a short natural reply in the user's language.
If the result was successful, confirm what was done.
If it failed, apologize and explain briefly; NEVER include raw error payloads or stack traces.
Respond with plain text only."#;

const DEFAULT_SUMMARY_SYSTEM: &str = r#"You condense chat history for a task-management assistant.
Given an older summary (possibly empty) and a block of dialog messages, produce a short
summary (2-3 sentences) of the topics discussed and actions taken, in the dialog's language.
Respond with plain text only."#;
