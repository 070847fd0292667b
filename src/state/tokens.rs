//! Token 估算（简单的字符计数近似）
//!
//! ASCII 约 4 字符/token，非 ASCII 约 1.5 字符/token。只是启发式近似，
//! 不追踪任何具体模型的真实分词器；语义压缩阈值据此估算。

use crate::state::DialogMessage;

pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }

    /// 估算整段对话历史的 token 总量
    pub fn estimate_history(history: &[DialogMessage]) -> usize {
        history.iter().map(|m| Self::estimate(&m.text)).sum()
    }
}
