//! 工具注册表
//!
//! 注册表在启动时装配完成，之后只读；它导出的 schema 列表
//! 既进决策提示词，也是决策校验的依据。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::tools::Tool;

/// 工具的声明式描述（决策提示词与校验共用）
#[derive(Clone, Debug, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub required: Vec<String>,
}

#[derive(Default)]
pub struct ToolRegistry {
    // BTreeMap 保证 schema 列表顺序稳定，提示词可复现
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；重名时后注册的覆盖前者
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                required: t.required_args().iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "возвращает аргументы без изменений"
        }
        fn required_args(&self) -> &[&str] {
            &["text"]
        }
        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert!(reg.contains("echo"));
        assert!(!reg.contains("missing"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_schemas_expose_required_args() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let schemas = reg.schemas();
        assert_eq!(schemas[0].name, "echo");
        assert_eq!(schemas[0].required, vec!["text".to_string()]);
    }
}
