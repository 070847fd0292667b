//! 对话层：意图理解与回复生成
//!
//! LLM 的结构化输出在这一层被严格解码为封闭枚举（IntentResult），
//! 下游永远不会在裸字符串上分支。

pub mod agent;
pub mod intent;
pub mod prompts;

pub use agent::DialogAgent;
pub use intent::{Intent, IntentResult};
pub use prompts::PromptSet;
