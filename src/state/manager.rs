//! StateManager：状态变更与三层优化
//!
//! 所有状态写入都经由这里，每轮结束前按序执行优化：
//! 1. 结构优化（纯函数）：移除终态任务、按上限裁剪各列表；
//! 2. 语义优化（LLM）：历史过长或 token 超阈值时，把较旧消息压缩为摘要；
//! 3. 相关性筛选（纯函数）：为提示词挑出与本轮消息最相关的少量任务。
//!
//! 优化失败从不让一轮失败：语义压缩出错时记录日志并保留原历史。

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StateSection;
use crate::dialog::{DialogAgent, Intent};
use crate::llm::Role;
use crate::state::tokens::TokenEstimator;
use crate::state::user_state::{ActionRecord, DialogMessage, TaskRef, TaskStatus, UserState};

/// 相关性打分权重：关键词命中任务标题 / ID
const SCORE_KEYWORD: i32 = 3;
/// 相关性打分权重：任务出现在最近动作里
const SCORE_RECENT_ACTION: i32 = 2;
/// 相关性打分权重：任务意图与本轮意图一致
const SCORE_INTENT: i32 = 1;

/// 相关性打分时忽略的过短词（单字符噪音）
const MIN_KEYWORD_CHARS: usize = 2;

/// 提示词里附带的最近动作条数
const CONTEXT_RECENT_ACTIONS: usize = 5;

/// 一次优化的统计（日志与测试观察用）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub tasks_dropped: usize,
    pub actions_dropped: usize,
    pub messages_dropped: usize,
    pub compacted: bool,
}

impl OptimizeStats {
    pub fn changed(&self) -> bool {
        self.tasks_dropped > 0
            || self.actions_dropped > 0
            || self.messages_dropped > 0
            || self.compacted
    }
}

/// 相关性筛选的产物：构建提示词所需的全部状态切片
#[derive(Clone, Debug)]
pub struct RelevantContext {
    pub current_context: Value,
    pub relevant_tasks: Vec<TaskRef>,
    pub recent_actions: Vec<ActionRecord>,
    pub dialog_summary: String,
}

pub struct StateManager {
    cfg: StateSection,
}

impl StateManager {
    pub fn new(cfg: StateSection) -> Self {
        Self { cfg }
    }

    // ---- 状态变更 ----

    /// 记录一个新任务引用；同 ID 已存在时刷新标题、状态、意图与触碰时间
    pub fn add_task(&self, state: &mut UserState, task: TaskRef) {
        if let Some(existing) = state.find_task_mut(&task.task_id) {
            existing.title = task.title;
            existing.status = task.status;
            if task.task_intent.is_some() {
                existing.task_intent = task.task_intent;
            }
            existing.updated_at = Some(Utc::now());
        } else {
            state.current_tasks.push(task);
        }
        self.touch(state);
    }

    /// 更新任务状态；任务不在引用列表时静默忽略（外部任务库才是权威）。
    /// 本次触碰携带意图时一并刷新，保持相关性打分的意图信号不过期。
    pub fn update_task_status(
        &self,
        state: &mut UserState,
        task_id: &str,
        status: TaskStatus,
        intent: Option<Intent>,
    ) {
        if let Some(task) = state.find_task_mut(task_id) {
            task.status = status;
            if intent.is_some() {
                task.task_intent = intent;
            }
            task.updated_at = Some(Utc::now());
        }
        self.touch(state);
    }

    pub fn add_action(&self, state: &mut UserState, record: ActionRecord) {
        state.recent_actions.push(record);
        self.touch(state);
    }

    pub fn add_dialog_message(&self, state: &mut UserState, role: Role, text: &str) {
        state.dialog_history.push(DialogMessage::new(role, text));
        state.metadata.estimated_tokens = TokenEstimator::estimate_history(&state.dialog_history);
        self.touch(state);
    }

    fn touch(&self, state: &mut UserState) {
        state.metadata.last_updated = Some(Utc::now());
    }

    // ---- 三层优化 ----

    /// 每轮结束前执行：结构优化必然发生，语义优化按阈值触发
    pub async fn optimize_state(
        &self,
        state: &mut UserState,
        dialog: &DialogAgent,
    ) -> OptimizeStats {
        let mut stats = self.optimize_structural(state);

        if self.should_compact(state) {
            match self.compact_history(state, dialog).await {
                Ok(dropped) => {
                    stats.messages_dropped += dropped;
                    stats.compacted = true;
                }
                Err(e) => {
                    warn!(user_id = %state.user_id, error = %e, "历史压缩失败，保留原历史");
                }
            }
        }

        if stats.changed() {
            state.metadata.optimization_count += 1;
            state.metadata.last_optimized = Some(Utc::now());
            debug!(
                user_id = %state.user_id,
                tasks_dropped = stats.tasks_dropped,
                actions_dropped = stats.actions_dropped,
                messages_dropped = stats.messages_dropped,
                compacted = stats.compacted,
                "状态优化完成"
            );
        }
        stats
    }

    /// 结构层：丢弃终态任务，把各列表裁到上限（保留最新的）
    pub fn optimize_structural(&self, state: &mut UserState) -> OptimizeStats {
        let mut stats = OptimizeStats::default();

        let before = state.current_tasks.len();
        state.current_tasks.retain(|t| !t.status.is_terminal());
        if state.current_tasks.len() > self.cfg.max_current_tasks {
            // 按最近触碰时间保留最新的 N 个，再恢复原有相对顺序
            let mut indexed: Vec<(usize, TaskRef)> =
                state.current_tasks.drain(..).enumerate().collect();
            indexed.sort_by(|a, b| b.1.last_touched().cmp(&a.1.last_touched()));
            indexed.truncate(self.cfg.max_current_tasks);
            indexed.sort_by_key(|(i, _)| *i);
            state.current_tasks = indexed.into_iter().map(|(_, t)| t).collect();
        }
        stats.tasks_dropped = before - state.current_tasks.len();

        let before = state.recent_actions.len();
        if before > self.cfg.max_recent_actions {
            let drop = before - self.cfg.max_recent_actions;
            state.recent_actions.drain(..drop);
        }
        stats.actions_dropped = before - state.recent_actions.len();

        let before = state.dialog_history.len();
        if before > self.cfg.max_dialog_history {
            let drop = before - self.cfg.max_dialog_history;
            state.dialog_history.drain(..drop);
            state.metadata.estimated_tokens =
                TokenEstimator::estimate_history(&state.dialog_history);
        }
        stats.messages_dropped = before - state.dialog_history.len();

        stats
    }

    /// 语义压缩的触发条件
    ///
    /// 末项保证幂等：压缩产物（≤ keep_recent 条）即使 token 估算仍超阈值，
    /// 也不会在下一轮被重复压缩。
    fn should_compact(&self, state: &UserState) -> bool {
        let len = state.dialog_history.len();
        (len > self.cfg.semantic_history_threshold
            || state.metadata.estimated_tokens > self.cfg.semantic_token_threshold)
            && len > self.cfg.compact_keep_recent
    }

    /// 把除最近 keep_recent 条外的历史折叠进 dialog_summary
    async fn compact_history(
        &self,
        state: &mut UserState,
        dialog: &DialogAgent,
    ) -> Result<usize, crate::core::AgentError> {
        let keep = self.cfg.compact_keep_recent;
        let split = state.dialog_history.len() - keep;
        let older = &state.dialog_history[..split];

        let summary = dialog
            .summarize_history(older, &state.dialog_summary)
            .await?;

        state.dialog_summary = summary;
        state.dialog_history.drain(..split);
        state.metadata.estimated_tokens = TokenEstimator::estimate_history(&state.dialog_history);
        Ok(split)
    }

    // ---- 相关性筛选 ----

    /// 为本轮提示词挑出最相关的任务切片（纯函数，顺序确定）
    ///
    /// 打分：关键词命中标题/ID +3，出现在最近动作 +2，意图一致 +1。
    /// 仅保留得分 > 0 的任务，按(得分降序, 最近触碰降序, task_id 升序)取前 K。
    pub fn relevant_context(
        &self,
        state: &UserState,
        message: &str,
        intent: Intent,
    ) -> RelevantContext {
        let keywords: Vec<String> = message
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();

        let mut scored: Vec<(i32, &TaskRef)> = state
            .current_tasks
            .iter()
            .filter_map(|task| {
                let mut score = 0;

                let haystack = format!("{} {}", task.task_id, task.title).to_lowercase();
                if keywords.iter().any(|k| haystack.contains(k.as_str())) {
                    score += SCORE_KEYWORD;
                }

                if state
                    .recent_actions
                    .iter()
                    .any(|a| a.task_id.as_deref() == Some(task.task_id.as_str()))
                {
                    score += SCORE_RECENT_ACTION;
                }

                if task.task_intent == Some(intent) {
                    score += SCORE_INTENT;
                }

                (score > 0).then_some((score, task))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.last_touched().cmp(&a.1.last_touched()))
                .then_with(|| a.1.task_id.cmp(&b.1.task_id))
        });
        scored.truncate(self.cfg.relevance_top_k);

        let recent_start = state
            .recent_actions
            .len()
            .saturating_sub(CONTEXT_RECENT_ACTIONS);

        RelevantContext {
            current_context: serde_json::to_value(&state.current_context)
                .unwrap_or(Value::Null),
            relevant_tasks: scored.into_iter().map(|(_, t)| t.clone()).collect(),
            recent_actions: state.recent_actions[recent_start..].to_vec(),
            dialog_summary: state.dialog_summary.clone(),
        }
    }
}
