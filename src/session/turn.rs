//! 单轮编排
//!
//! handle_turn 是整个系统的主干：每一步的失败都有明确的降级路径，
//! 存储故障也只换来一条"请重试"回复——任何失败都不越出回合边界。
//! user_id 由调用方传入并注入工具参数，模型输出永远无法指定它。

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::decision::{Decision, DecisionEngine};
use crate::dialog::{DialogAgent, Intent, IntentResult};
use crate::llm::Role;
use crate::state::{
    ActionOutcome, ActionRecord, StateManager, StateStore, TaskRef, TaskStatus, UserState,
};
use crate::tools::{ToolInvoker, ToolResult};

/// 意图理解不可用时的降级回复
const INTENT_FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble understanding right now. Please try again in a moment.";

/// 状态存储读写失败（重试后仍失败）时的降级回复
const STORE_FALLBACK_REPLY: &str =
    "Sorry, something went wrong on my side. Please try again.";

pub struct AgentSession {
    dialog: DialogAgent,
    decision: DecisionEngine,
    state_mgr: StateManager,
    store: Arc<dyn StateStore>,
    invoker: ToolInvoker,
}

impl AgentSession {
    pub fn new(
        dialog: DialogAgent,
        decision: DecisionEngine,
        state_mgr: StateManager,
        store: Arc<dyn StateStore>,
        invoker: ToolInvoker,
    ) -> Self {
        Self {
            dialog,
            decision,
            state_mgr,
            store,
            invoker,
        }
    }

    /// 处理一个用户的一条消息，返回给用户的回复文本
    ///
    /// 协议：加载状态 → 记录消息 → 理解意图 →（澄清短路）→ 决策 →
    /// 执行工具 → 生成回复 → 记录回复 → 优化 → 持久化（一次重试）。
    /// 任何失败（存储在内）都降级为用户可见的回复，永远不向上抛错。
    pub async fn handle_turn(&self, user_id: &str, text: &str) -> String {
        let mut state = match self.store.get(user_id).await {
            Ok(loaded) => loaded.unwrap_or_else(|| UserState::empty(user_id)),
            Err(e) => {
                error!(user_id, error = %e, "状态加载失败，无法处理本轮");
                return STORE_FALLBACK_REPLY.to_string();
            }
        };

        state.metadata.total_turns += 1;
        self.state_mgr
            .add_dialog_message(&mut state, Role::User, text);

        // 当前消息刚被追加到历史，理解时只带它之前的上下文
        let prior = &state.dialog_history[..state.dialog_history.len() - 1];
        let intent = match self.dialog.understand_intent(text, prior).await {
            Ok(intent) => intent,
            Err(e) => {
                // 理解不可用：降级回复，失败尝试计入动作记录，状态照常持久化
                warn!(user_id, error = %e, "意图理解失败，降级回复");
                self.state_mgr.add_action(
                    &mut state,
                    ActionRecord::new("understand_intent", ActionOutcome::Failed)
                        .with_detail(e.to_string()),
                );
                return self
                    .finish_turn(&mut state, INTENT_FALLBACK_REPLY.to_string())
                    .await;
            }
        };
        info!(user_id, intent = intent.intent.as_str(), "意图已识别");
        state.set_context("active_intent", intent.intent.as_str());
        if !intent.entities.is_empty() {
            state.set_context("mentioned_entities", &intent.entities);
        }

        // 澄清短路：不决策、不执行工具
        if intent.needs_clarification {
            if let Some(question) = intent.clarification_question.clone() {
                state.set_context("pending_clarification", &question);
                return self.finish_turn(&mut state, question).await;
            }
        }
        state.current_context.remove("pending_clarification");

        // 决策前先优化：决策引擎只看到有界、压缩过的状态切片
        self.state_mgr.optimize_state(&mut state, &self.dialog).await;

        let ctx = self.state_mgr.relevant_context(&state, text, intent.intent);
        let schemas = self.invoker.registry().schemas();
        let decision = self.decision.decide(text, &intent, &ctx, &schemas).await;

        let reply = match decision {
            Decision::Noop { message } => self.dialog.format_simple_response(&message),
            Decision::ToolCall {
                tool_name,
                mut tool_arguments,
            } => {
                self.execute_tool(&mut state, &intent, &tool_name, &mut tool_arguments)
                    .await
            }
        };

        self.finish_turn(&mut state, reply).await
    }

    /// 执行一个已通过校验的工具调用，返回面向用户的回复
    async fn execute_tool(
        &self,
        state: &mut UserState,
        intent: &IntentResult,
        tool_name: &str,
        tool_arguments: &mut Value,
    ) -> String {
        if let Some(obj) = tool_arguments.as_object_mut() {
            obj.insert("user_id".to_string(), Value::String(state.user_id.clone()));
        }

        self.state_mgr.add_action(
            state,
            ActionRecord::new(tool_name, ActionOutcome::Initiated),
        );
        let result = self.invoker.invoke(tool_name, tool_arguments.clone()).await;
        self.record_tool_outcome(state, intent.intent, tool_name, tool_arguments, &result);

        // 工具结果先行落盘，回复生成失败也不丢已执行的副作用；
        // 这里失败不致命，回合末的持久化还会重试
        if let Err(e) = self.store.put(&state.user_id, state).await {
            warn!(user_id = %state.user_id, error = %e, "工具结果先行持久化失败");
        }

        match self
            .dialog
            .format_response(intent.intent, tool_name, &result)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(tool = tool_name, error = %e, "回复生成失败，使用兜底文案");
                self.dialog.fallback_reply(tool_name, &result)
            }
        }
    }

    /// 把工具结果映射回状态：动作记录 + 任务引用维护
    fn record_tool_outcome(
        &self,
        state: &mut UserState,
        intent: Intent,
        tool_name: &str,
        args: &Value,
        result: &ToolResult,
    ) {
        let outcome = if result.success {
            ActionOutcome::Success
        } else {
            ActionOutcome::Failed
        };

        let result_task_id = result
            .data
            .as_ref()
            .and_then(|d| d.get("task_id"))
            .and_then(Value::as_str)
            .or_else(|| args.get("task_id").and_then(Value::as_str))
            .map(str::to_string);

        let mut record = ActionRecord::new(tool_name, outcome);
        if let Some(ref id) = result_task_id {
            record = record.with_task_id(id.clone());
        }
        if let Some(ref e) = result.error {
            record = record.with_detail(e.clone());
        }
        self.state_mgr.add_action(state, record);

        if !result.success {
            return;
        }

        match tool_name {
            "create_task" => {
                if let (Some(data), Some(task_id)) = (result.data.as_ref(), result_task_id) {
                    let title = data
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    self.state_mgr.add_task(
                        state,
                        TaskRef {
                            task_id,
                            title,
                            status: TaskStatus::Active,
                            task_intent: Some(intent),
                            added_at: chrono::Utc::now(),
                            updated_at: None,
                        },
                    );
                }
            }
            "update_task_status" => {
                if let (Some(task_id), Some(status)) = (
                    args.get("task_id").and_then(Value::as_str),
                    args.get("status").and_then(Value::as_str),
                ) {
                    self.state_mgr.update_task_status(
                        state,
                        task_id,
                        TaskStatus::parse_loose(status),
                        Some(intent),
                    );
                }
            }
            _ => {}
        }
    }

    /// 收尾：记录回复、恢复结构边界、持久化（失败重试一次）
    ///
    /// 语义压缩在下一轮决策前进行，这里只做廉价的结构裁剪，
    /// 保证持久化的状态始终有界。重试后仍写不进去时，
    /// 回复替换为"请重试"文案——优化结果只是延迟落盘，不算丢失。
    async fn finish_turn(&self, state: &mut UserState, reply: String) -> String {
        self.state_mgr
            .add_dialog_message(state, Role::Assistant, &reply);
        self.state_mgr.optimize_structural(state);

        if let Err(first) = self.store.put(&state.user_id, state).await {
            warn!(user_id = %state.user_id, error = %first, "状态持久化失败，重试一次");
            if let Err(second) = self.store.put(&state.user_id, state).await {
                error!(user_id = %state.user_id, error = %second, "状态持久化重试仍失败");
                return STORE_FALLBACK_REPLY.to_string();
            }
        }
        reply
    }
}
