//! 决策层：由 LLM 提议行动，由确定性校验裁决
//!
//! LLM 是不可信的提议者：它的输出只有通过工具表与必填参数校验
//! 才能成为 ToolCall，任何失败都降级为安全的 Noop，绝不向上抛错。

pub mod engine;
pub mod schema;

pub use engine::DecisionEngine;
pub use schema::{decode_decision, Decision};
