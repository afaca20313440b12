//! 测试辅助：本地假代理与可计数的探测实现，测试不依赖外网。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::model::Candidate;
use crate::service::probe::{Probe, ProbeOutcome};

/// 经由代理访问的目标，只有代理会去"解析"它
pub const TARGET: &str = "http://verify.invalid/ip";

/// 对每个请求都回同一个状态码和响应体的 HTTP 代理，并记录被连接的次数
pub struct FakeProxy {
    pub port: u16,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FakeProxy {
    pub async fn start(status: u16, body: &str) -> Self {
        Self::start_on("127.0.0.1:0", status, body).await
    }

    pub async fn start_on(addr: &str, status: u16, body: &str) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let body = body.to_string();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                tokio::spawn(async move {
                    let _ = answer(stream, status, &body).await;
                });
            }
        });
        Self { port, hits, handle }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for FakeProxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn answer(mut stream: TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let resp = format!(
        "HTTP/1.1 {} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(resp.as_bytes()).await?;
    stream.shutdown().await
}

/// 接受连接但从不回应的代理，返回端口
pub async fn silent_proxy() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    port
}

/// 一个当前无人监听的端口
pub fn refused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// 记录调用次数与并发峰值的探测实现
pub struct CountingProbe {
    delay: Duration,
    outcome: fn(&Candidate) -> ProbeOutcome,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn new(delay: Duration, outcome: fn(&Candidate) -> ProbeOutcome) -> Self {
        Self {
            delay,
            outcome,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 偶数端口返回 200，奇数端口连接失败
pub fn even_ports_work(candidate: &Candidate) -> ProbeOutcome {
    if candidate.port % 2 == 0 {
        ProbeOutcome::Completed {
            status: 200,
            elapsed: Duration::from_millis(u64::from(candidate.port % 1000)),
            preview: Some("ok".into()),
        }
    } else {
        ProbeOutcome::Failed("connection refused".into())
    }
}

#[async_trait]
impl Probe for CountingProbe {
    async fn probe(&self, candidate: &Candidate, _target_url: &str) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.outcome)(candidate)
    }
}
