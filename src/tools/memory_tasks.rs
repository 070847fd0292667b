//! 内存任务库与四个任务工具
//!
//! InMemoryTaskService 是任务的权威存储（按用户隔离），UserState 里的
//! TaskRef 只是它的引用。工具参数中的 user_id 由编排器注入，
//! 不来自模型输出。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::TaskStatus;
use crate::tools::{Tool, ToolRegistry};

/// 任务库中的一条任务
#[derive(Clone, Debug, Serialize)]
pub struct StoredTask {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryTaskService {
    // user_id -> 该用户的任务列表（插入序）
    tasks: RwLock<HashMap<String, Vec<StoredTask>>>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user_id: &str, title: &str) -> StoredTask {
        let task = StoredTask {
            task_id: format!("t_{}", Uuid::new_v4().simple()),
            title: title.to_string(),
            status: TaskStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.tasks
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(task.clone());
        task
    }

    pub async fn list(&self, user_id: &str) -> Vec<StoredTask> {
        self.tasks
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn update_status(
        &self,
        user_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Option<StoredTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(user_id)?
            .iter_mut()
            .find(|t| t.task_id == task_id)?;
        task.status = status;
        task.updated_at = Some(Utc::now());
        Some(task.clone())
    }

    pub async fn search(&self, user_id: &str, query: &str) -> Vec<StoredTask> {
        let needle = query.to_lowercase();
        self.tasks
            .read()
            .await
            .get(user_id)
            .map(|tasks| {
                tasks
                    .iter()
                    .filter(|t| t.title.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("参数 {key} 必须是非空字符串"))
}

fn tasks_payload(tasks: Vec<StoredTask>) -> Value {
    json!({ "count": tasks.len(), "tasks": tasks })
}

pub struct CreateTaskTool {
    service: Arc<InMemoryTaskService>,
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }
    fn description(&self) -> &str {
        "Create a new task with the given title"
    }
    fn required_args(&self) -> &[&str] {
        &["title"]
    }
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let user_id = str_arg(&args, "user_id")?;
        let title = str_arg(&args, "title")?;
        let task = self.service.create(user_id, title).await;
        serde_json::to_value(&task).map_err(|e| e.to_string())
    }
}

pub struct GetUserTasksTool {
    service: Arc<InMemoryTaskService>,
}

#[async_trait]
impl Tool for GetUserTasksTool {
    fn name(&self) -> &str {
        "get_user_tasks"
    }
    fn description(&self) -> &str {
        "List all tasks of the current user"
    }
    fn required_args(&self) -> &[&str] {
        &[]
    }
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let user_id = str_arg(&args, "user_id")?;
        Ok(tasks_payload(self.service.list(user_id).await))
    }
}

pub struct UpdateTaskStatusTool {
    service: Arc<InMemoryTaskService>,
}

#[async_trait]
impl Tool for UpdateTaskStatusTool {
    fn name(&self) -> &str {
        "update_task_status"
    }
    fn description(&self) -> &str {
        "Update the status of an existing task (active / done / cancelled)"
    }
    fn required_args(&self) -> &[&str] {
        &["task_id", "status"]
    }
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let user_id = str_arg(&args, "user_id")?;
        let task_id = str_arg(&args, "task_id")?;
        let status = TaskStatus::parse_loose(str_arg(&args, "status")?);
        match self.service.update_status(user_id, task_id, status).await {
            Some(task) => serde_json::to_value(&task).map_err(|e| e.to_string()),
            None => Err(format!("задача {task_id} не найдена")),
        }
    }
}

pub struct SearchTasksTool {
    service: Arc<InMemoryTaskService>,
}

#[async_trait]
impl Tool for SearchTasksTool {
    fn name(&self) -> &str {
        "search_tasks"
    }
    fn description(&self) -> &str {
        "Search the user's tasks by a substring of the title"
    }
    fn required_args(&self) -> &[&str] {
        &["query"]
    }
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let user_id = str_arg(&args, "user_id")?;
        let query = str_arg(&args, "query")?;
        Ok(tasks_payload(self.service.search(user_id, query).await))
    }
}

/// 把四个任务工具注册到注册表
pub fn register_task_tools(registry: &mut ToolRegistry, service: Arc<InMemoryTaskService>) {
    registry.register(Arc::new(CreateTaskTool {
        service: service.clone(),
    }));
    registry.register(Arc::new(GetUserTasksTool {
        service: service.clone(),
    }));
    registry.register(Arc::new(UpdateTaskStatusTool {
        service: service.clone(),
    }));
    registry.register(Arc::new(SearchTasksTool { service }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_list_are_per_user() {
        let svc = InMemoryTaskService::new();
        svc.create("u1", "купить молоко").await;
        svc.create("u2", "помыть машину").await;

        let u1 = svc.list("u1").await;
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].title, "купить молоко");
        assert_eq!(svc.list("u2").await.len(), 1);
        assert!(svc.list("u3").await.is_empty());
    }

    #[tokio::test]
    async fn test_update_status_and_search() {
        let svc = InMemoryTaskService::new();
        let task = svc.create("u1", "купить молоко").await;

        let updated = svc
            .update_status("u1", &task.task_id, TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert!(svc.update_status("u1", "t_missing", TaskStatus::Done).await.is_none());

        let hits = svc.search("u1", "МОЛОКО").await;
        assert_eq!(hits.len(), 1);
        assert!(svc.search("u1", "хлеб").await.is_empty());
    }

    #[tokio::test]
    async fn test_tools_require_injected_user_id() {
        let svc = Arc::new(InMemoryTaskService::new());
        let tool = CreateTaskTool {
            service: svc.clone(),
        };
        let err = tool
            .execute(json!({"title": "купить молоко"}))
            .await
            .unwrap_err();
        assert!(err.contains("user_id"));
    }

    #[tokio::test]
    async fn test_create_tool_returns_task_payload() {
        let svc = Arc::new(InMemoryTaskService::new());
        let tool = CreateTaskTool { service: svc };
        let value = tool
            .execute(json!({"user_id": "u1", "title": "купить молоко"}))
            .await
            .unwrap();
        assert_eq!(value["title"], "купить молоко");
        assert!(value["task_id"].as_str().unwrap().starts_with("t_"));
    }
}
