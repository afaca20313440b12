//! 把来源的原始内容解析成候选代理。
//!
//! 解析失败的条目一律静默跳过，不影响该来源其余条目的贡献。

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::model::{Candidate, Protocol};

/// 匹配文本中的 `ip:port`
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\d{1,3}\.){3}\d{1,3}:\d{2,5}").expect("Invalid IP:PORT regex")
});

/// 扫描纯文本列表，协议取自来源配置。
pub fn parse_text_list(content: &str, protocol: Protocol) -> Vec<Candidate> {
    IP_PORT_REGEX
        .find_iter(content)
        .filter_map(|m| {
            let (ip, port) = m.as_str().split_once(':')?;
            // 过滤 999.1.1.1 这类非法地址
            ip.parse::<Ipv4Addr>().ok()?;
            let port: u16 = port.parse().ok()?;
            Candidate::new(ip, port, protocol).ok()
        })
        .collect()
}

/// 解析 geonode 风格的结构化列表，每个条目可展开成多个协议。
pub fn parse_structured_list(payload: &Value) -> Vec<Candidate> {
    let Some(items) = payload.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for item in items {
        let Some(ip) = item.get("ip").and_then(Value::as_str) else {
            continue;
        };
        let Some(port) = item.get("port").and_then(port_value) else {
            continue;
        };
        let protocols = item
            .get("protocols")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for proto in protocols.iter().filter_map(Value::as_str) {
            match proto.parse::<Protocol>() {
                Ok(protocol) => {
                    if let Ok(c) = Candidate::new(ip, port, protocol) {
                        candidates.push(c);
                    }
                }
                Err(_) => trace!("跳过不支持的协议 {} ({}:{})", proto, ip, port),
            }
        }
    }
    candidates
}

/// 端口既可能是数字也可能是数字字符串
fn port_value(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
