//! LLM 输出的 JSON 提取
//!
//! 模型常把 JSON 包在 ```json 围栏或解释文字里；先剥围栏再取最外层花括号区间。

/// 从 LLM 文本输出中提取 JSON 块；找不到任何 `{` 时返回 None
pub fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim());
        return Some(block);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let out = r#"{"intent": "greeting"}"#;
        assert_eq!(extract_json_block(out), Some(r#"{"intent": "greeting"}"#));
    }

    #[test]
    fn test_fenced_json() {
        let out = "Here you go:\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(out), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let out = "Sure! {\"a\": 1} hope that helps";
        assert_eq!(extract_json_block(out), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json_block("just words"), None);
    }
}
