//! 核心层：贯穿全部模块的错误类型

pub mod error;

pub use error::AgentError;
