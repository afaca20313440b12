//! 用存储中的可用代理集合测试指定端点。结果只用于汇总展示，不回写存储。

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{info, warn};

use crate::db::ProxyStore;
use crate::error::Result;
use crate::model::EndpointTestResult;
use crate::service::coordinator::Coordinator;
use crate::service::probe::Probe;

/// 汇总里展示的最快代理数量
const TOP_N: usize = 10;

pub struct EndpointTester<P: Probe> {
    coordinator: Coordinator<P>,
    store: Arc<dyn ProxyStore>,
}

impl<P: Probe> EndpointTester<P> {
    pub fn new(coordinator: Coordinator<P>, store: Arc<dyn ProxyStore>) -> Self {
        Self { coordinator, store }
    }

    /// 载入全部可用代理并逐一测试 `endpoint`。
    ///
    /// 可用集合为空时不发起任何探测，直接返回空列表。
    pub async fn test_all_proxies_against_endpoint(&self, endpoint: &str) -> Result<Vec<EndpointTestResult>> {
        let working = self.store.find_working().await?;
        if working.is_empty() {
            warn!("[!] 存储中没有可用代理，跳过端点测试");
            return Ok(Vec::new());
        }

        info!("========== [端点测试阶段] ==========");
        Ok(self.coordinator.test_many(working, endpoint).await)
    }
}

/// 端点测试的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub total: usize,
    pub successful: usize,
    /// 成功结果中响应最快的若干条，升序
    pub fastest: Vec<EndpointTestResult>,
}

impl TestSummary {
    pub fn from_results(results: &[EndpointTestResult]) -> Self {
        let mut fastest: Vec<EndpointTestResult> = results.iter().filter(|r| r.success).cloned().collect();
        let successful = fastest.len();

        fastest.sort_by(|a, b| {
            a.response_time
                .partial_cmp(&b.response_time)
                .unwrap_or(Ordering::Equal)
        });
        fastest.truncate(TOP_N);

        Self { total: results.len(), successful, fastest }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }

    /// 成功但没进入最快列表的数量
    pub fn remaining(&self) -> usize {
        self.successful - self.fastest.len()
    }

    pub fn log(&self) {
        info!("========== [端点测试汇总] ==========");
        info!(
            "共测试 {} 条，成功 {} 条（{:.1}%）",
            self.total,
            self.successful,
            self.success_rate() * 100.0
        );
        if !self.fastest.is_empty() {
            info!("最快的 {} 条代理：", self.fastest.len());
            for r in &self.fastest {
                info!("    {} ({}) - {}s", r.proxy, r.protocol, r.response_time.unwrap_or_default());
            }
            if self.remaining() > 0 {
                info!("    ... 以及另外 {} 条", self.remaining());
            }
        }
    }
}
