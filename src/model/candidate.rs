use std::borrow::Cow;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// 代理协议，候选代理只允许这三种。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Socks4,
    Socks5,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "socks4" => Ok(Protocol::Socks4),
            "socks5" => Ok(Protocol::Socks5),
            other => Err(HarvestError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// 待验证的候选代理。
///
/// 身份由 `(host, port, protocol)` 三元组决定，去重与存储唯一约束都基于它。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// IPv4/IPv6 字面量或主机名
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Candidate {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Result<Self, HarvestError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(HarvestError::InvalidCandidate { host, port, reason: "empty host" });
        }
        if port == 0 {
            return Err(HarvestError::InvalidCandidate { host, port, reason: "port out of range" });
        }
        Ok(Self { host, port, protocol })
    }

    /// 形如 `socks5://1.2.3.4:1080` 的代理连接串
    pub fn proxy_url(&self) -> String {
        format!("{}://{}", self.protocol, self.address())
    }

    /// 形如 `1.2.3.4:1080`，IPv6 地址写作 `[::1]:1080`
    pub fn address(&self) -> String {
        format!("{}:{}", self.url_host(), self.port)
    }

    fn url_host(&self) -> Cow<'_, str> {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            Cow::Owned(format!("[{}]", self.host))
        } else {
            Cow::Borrowed(&self.host)
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address(), self.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!(" socks5 ".parse::<Protocol>().unwrap(), Protocol::Socks5);
        assert!(matches!(
            "https".parse::<Protocol>(),
            Err(HarvestError::UnsupportedProtocol(p)) if p == "https"
        ));
    }

    #[test]
    fn test_candidate_rejects_bad_identity() {
        assert!(Candidate::new("", 80, Protocol::Http).is_err());
        assert!(Candidate::new("   ", 80, Protocol::Http).is_err());
        assert!(Candidate::new("1.2.3.4", 0, Protocol::Http).is_err());
    }

    #[test]
    fn test_candidate_urls() {
        let c = Candidate::new("5.6.7.8", 1080, Protocol::Socks5).unwrap();
        assert_eq!(c.proxy_url(), "socks5://5.6.7.8:1080");
        assert_eq!(c.address(), "5.6.7.8:1080");
        assert_eq!(c.to_string(), "5.6.7.8:1080 (socks5)");
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let c = Candidate::new("::1", 8080, Protocol::Http).unwrap();
        assert_eq!(c.proxy_url(), "http://[::1]:8080");
        assert_eq!(c.address(), "[::1]:8080");
        assert_eq!(c.to_string(), "[::1]:8080 (http)");

        let named = Candidate::new("proxy.example", 3128, Protocol::Http).unwrap();
        assert_eq!(named.address(), "proxy.example:3128");
    }
}
