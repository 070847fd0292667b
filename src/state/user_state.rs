//! 按用户状态模型
//!
//! UserState 是一个用户的全部会话状态：当前上下文、任务引用、最近动作、
//! 对话历史与摘要。任务条目只是外部任务库的引用，从不作为权威数据。
//! 所有上界由 StateManager 的优化维护，而非在这里硬编码。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialog::Intent;
use crate::llm::Role;

/// 任务状态（封闭枚举；外部字符串经 parse_loose 归一化）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// 终态任务在结构优化时被移出 current_tasks
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// 宽松解析工具参数里的状态字符串；未知值归为 Active
    pub fn parse_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "done" | "completed" | "closed" | "finished" => TaskStatus::Done,
            "cancelled" | "canceled" | "deleted" => TaskStatus::Cancelled,
            _ => TaskStatus::Active,
        }
    }
}

/// 外部任务的轻量引用
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    /// 创建 / 最近触碰该任务时的意图类别，用于相关性打分
    pub task_intent: Option<Intent>,
    pub added_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskRef {
    /// 最近触碰时间（相关性排序的平局裁决）
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.added_at)
    }
}

/// 动作结果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Initiated,
    Success,
    Failed,
}

/// recent_actions 中的一条记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRecord {
    /// 动作名（工具名或内部步骤名，如 understand_intent）
    pub action: String,
    pub outcome: ActionOutcome,
    /// 相关任务 ID（若有），相关性打分用它做精确匹配
    pub task_id: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(action: impl Into<String>, outcome: ActionOutcome) -> Self {
        Self {
            action: action.into(),
            outcome,
            task_id: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// 对话历史中的一条消息（仅 User / Assistant）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl DialogMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 状态元数据：计数器与优化时间戳
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateMetadata {
    pub total_turns: u64,
    pub estimated_tokens: usize,
    pub optimization_count: u64,
    pub last_optimized: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// 一个用户的全部会话状态；存储中一条记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserState {
    pub user_id: String,
    /// 自由键值：active_intent、mentioned_entities、待澄清问题等
    pub current_context: HashMap<String, serde_json::Value>,
    pub current_tasks: Vec<TaskRef>,
    pub recent_actions: Vec<ActionRecord>,
    pub dialog_history: Vec<DialogMessage>,
    /// 被压缩历史的摘要；首次压缩前为空
    pub dialog_summary: String,
    pub metadata: StateMetadata,
}

impl UserState {
    /// 规范空状态：存储中无记录时的形态
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_context: HashMap::new(),
            current_tasks: Vec::new(),
            recent_actions: Vec::new(),
            dialog_history: Vec::new(),
            dialog_summary: String::new(),
            metadata: StateMetadata::default(),
        }
    }

    pub fn find_task(&self, task_id: &str) -> Option<&TaskRef> {
        self.current_tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut TaskRef> {
        self.current_tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    /// 设置上下文键（序列化失败的值直接忽略，上下文是尽力而为的提示信息）
    pub fn set_context(&mut self, key: &str, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.current_context.insert(key.to_string(), v);
        }
    }
}
