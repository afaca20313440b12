use crate::model::Candidate;
use std::collections::HashSet;
use std::time::Duration;
use tracing::Level;

/// 将浮点数四舍五入为三位小数。
pub fn round3(val: f64) -> f64 {
    (val * 1000.0).round() / 1000.0
}

/// 按 `(host, port, protocol)` 去重，保留首次出现的顺序。
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for candidate in candidates.into_iter() {
        if seen.insert(candidate.clone()) {
            result.push(candidate);
        }
    }
    result
}

/// 分钟数转为 `Duration`，过大的值饱和而不溢出
pub fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

/// 截取前 `max` 个字符（按字符而非字节）
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// 表名基本校验
pub fn validate_table_name(name: &str) -> bool {
    // 限定表名为英文字母、下划线、数字，且不能以数字开头
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
}

// 把字符串转换成 Level，忽略大小写，不识别时返回 None
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
