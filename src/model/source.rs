use serde::{Deserialize, Serialize};

use crate::model::candidate::Protocol;

/// 代理列表来源。
///
/// 来源的数据格式在配置阶段就定下来，解析时不再根据名字猜测。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub format: SourceFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// 纯文本，逐个匹配 `ip:port`，协议由配置给出
    TextList { protocol: Protocol },
    /// geonode 风格的 JSON：`{"data": [{"ip", "port", "protocols": [..]}]}`
    StructuredList,
}

impl Source {
    pub fn text(name: &str, url: &str, protocol: Protocol) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            format: SourceFormat::TextList { protocol },
        }
    }

    pub fn structured(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            format: SourceFormat::StructuredList,
        }
    }
}

mod urls {
    pub const PROXYSCRAPE_HTTP: &str = "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&format=text&timeout=10000";
    pub const PROXYSCRAPE_SOCKS4: &str = "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks4&format=text&timeout=10000";
    pub const PROXYSCRAPE_SOCKS5: &str = "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks5&format=text&timeout=10000";
    pub const SPEEDX_HTTP: &str = "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt";
    pub const SPEEDX_SOCKS4: &str = "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks4.txt";
    pub const SPEEDX_SOCKS5: &str = "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks5.txt";
    pub const OPENPROXYLIST_HTTP: &str = "https://openproxylist.xyz/http.txt";
    pub const PROXYLIST_DOWNLOAD_HTTP: &str = "https://www.proxy-list.download/api/v1/get?type=http";
    pub const GEONODE: &str = "https://proxylist.geonode.com/api/proxy-list?limit=500&page=1&sort_by=lastChecked&sort_type=desc";
}

/// 内置的公开代理来源
pub fn default_sources() -> Vec<Source> {
    vec![
        Source::text("proxyscrape_http", urls::PROXYSCRAPE_HTTP, Protocol::Http),
        Source::text("proxyscrape_socks4", urls::PROXYSCRAPE_SOCKS4, Protocol::Socks4),
        Source::text("proxyscrape_socks5", urls::PROXYSCRAPE_SOCKS5, Protocol::Socks5),
        Source::text("the_speedx_http", urls::SPEEDX_HTTP, Protocol::Http),
        Source::text("the_speedx_socks4", urls::SPEEDX_SOCKS4, Protocol::Socks4),
        Source::text("the_speedx_socks5", urls::SPEEDX_SOCKS5, Protocol::Socks5),
        Source::text("openproxylist_http", urls::OPENPROXYLIST_HTTP, Protocol::Http),
        Source::text("proxylist_download_http", urls::PROXYLIST_DOWNLOAD_HTTP, Protocol::Http),
        Source::structured("geonode", urls::GEONODE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources() {
        let sources = default_sources();
        assert_eq!(sources.len(), 9);
        for source in &sources {
            assert!(!source.name.is_empty());
            assert!(source.url.starts_with("https://"));
        }
        assert_eq!(
            sources.iter().filter(|s| s.format == SourceFormat::StructuredList).count(),
            1
        );
    }

    #[test]
    fn test_source_format_deserialize() {
        let json = r#"{"name":"x","url":"http://x","format":{"kind":"text_list","protocol":"socks4"}}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.format, SourceFormat::TextList { protocol: Protocol::Socks4 });

        let json = r#"{"name":"g","url":"http://g","format":{"kind":"structured_list"}}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.format, SourceFormat::StructuredList);
    }
}
