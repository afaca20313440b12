//! # probe 模块
//!
//! 通过候选代理向目标地址发起一次 GET 请求。
//!
//! - 每次探测单独构建 `reqwest` 客户端，代理只绑定到这一次请求；
//! - 客户端超时之外再套一层 `tokio::time::timeout`，保证探测不会挂起；
//! - 不做重试，一次失败即是本轮的最终结论。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode, Url};

use crate::common::utils::truncate_chars;
use crate::model::{Candidate, Protocol, VerifyConfig};

/// 200 响应体保留的字符数
const PREVIEW_CHARS: usize = 200;

/// 单次探测的原始结论
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// 请求完成并拿到了状态码（不一定是 200）
    Completed {
        status: u16,
        elapsed: Duration,
        preview: Option<String>,
    },
    /// 网络错误、超时、连接被拒等
    Failed(String),
}

/// 探测接口。协调器只依赖这个 trait，测试里可以替换成计数用的实现。
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self, candidate: &Candidate, target_url: &str) -> ProbeOutcome;
}

/// 基于 `reqwest` 的真实探测实现
#[derive(Debug, Clone)]
pub struct HttpProbe {
    timeout: Duration,
    http_proxies_https: bool,
}

impl HttpProbe {
    pub fn new(config: &VerifyConfig) -> Self {
        Self {
            timeout: config.timeout(),
            http_proxies_https: config.http_proxies_https,
        }
    }

    /// `http` 代理在关闭 `http_proxies_https` 时不承载 https 目标
    fn routes(&self, candidate: &Candidate, target_url: &str) -> bool {
        match candidate.protocol {
            Protocol::Http if !self.http_proxies_https => Url::parse(target_url)
                .map(|url| url.scheme() != "https")
                .unwrap_or(true),
            Protocol::Http | Protocol::Socks4 | Protocol::Socks5 => true,
        }
    }

    fn client_for(&self, candidate: &Candidate) -> reqwest::Result<Client> {
        let url = candidate.proxy_url();
        let proxy = match candidate.protocol {
            Protocol::Http if !self.http_proxies_https => Proxy::http(&url)?,
            Protocol::Http | Protocol::Socks4 | Protocol::Socks5 => Proxy::all(&url)?,
        };

        Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
    }

    async fn request(&self, candidate: &Candidate, target_url: &str) -> reqwest::Result<ProbeOutcome> {
        let client = self.client_for(candidate)?;
        let start = Instant::now();

        let resp = client.get(target_url).send().await?;
        let status = resp.status();
        let preview = if status == StatusCode::OK {
            // 响应体读失败不影响状态码结论
            resp.text().await.ok().map(|body| truncate_chars(&body, PREVIEW_CHARS))
        } else {
            None
        };

        Ok(ProbeOutcome::Completed {
            status: status.as_u16(),
            elapsed: start.elapsed(),
            preview,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, candidate: &Candidate, target_url: &str) -> ProbeOutcome {
        // 请求不经过代理就直连目标，结果不能算作代理可用
        if !self.routes(candidate, target_url) {
            return ProbeOutcome::Failed("http proxy not used for https targets".into());
        }

        match tokio::time::timeout(self.timeout, self.request(candidate, target_url)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
            Err(_) => ProbeOutcome::Failed(format!("timed out after {}s", self.timeout.as_secs_f64())),
        }
    }
}
