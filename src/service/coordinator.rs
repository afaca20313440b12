//! # coordinator 模块
//!
//! 以有界并发批量执行探测。
//!
//! - 每个候选一个 tokio 任务，全部一次性提交；
//! - 信号量限制同时在途的探测数，采集与端点测试各自一套额度；
//! - 等待所有任务结束后才返回，不会提前中止；
//! - 结果顺序不保证与提交顺序一致。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::model::{Candidate, EndpointTestResult, ValidationRecord, VerifyConfig};
use crate::service::probe::Probe;
use crate::service::validator;

pub struct Coordinator<P: Probe> {
    probe: Arc<P>,
    harvest_limit: usize,
    endpoint_limit: usize,
}

impl<P: Probe> Clone for Coordinator<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            harvest_limit: self.harvest_limit,
            endpoint_limit: self.endpoint_limit,
        }
    }
}

impl<P: Probe> Coordinator<P> {
    pub fn new(probe: Arc<P>, config: &VerifyConfig) -> Self {
        Self::with_limits(probe, config.harvest_concurrency, config.endpoint_concurrency)
    }

    pub fn with_limits(probe: Arc<P>, harvest_limit: usize, endpoint_limit: usize) -> Self {
        Self {
            probe,
            harvest_limit: harvest_limit.max(1),
            endpoint_limit: endpoint_limit.max(1),
        }
    }

    /// 采集路径：并发验证所有候选，只返回可用的记录。
    ///
    /// 返回数量不超过输入数量。
    pub async fn validate_many(&self, candidates: Vec<Candidate>, target_url: &str) -> Vec<ValidationRecord> {
        let len = candidates.len();
        info!("========== [代理验证阶段] ==========");
        info!("🚀 开始批量验证代理，共 {} 条待验证，并发上限 {}", len, self.harvest_limit);

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.harvest_limit));
        let target: Arc<str> = Arc::from(target_url);

        let tasks: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let probe = Arc::clone(&self.probe);
                let target = Arc::clone(&target);
                spawn_gated(&semaphore, async move {
                    validator::validate(probe.as_ref(), candidate, &target).await
                })
            })
            .collect();

        let mut records = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => error!("❌ 验证任务异常退出：{}", e),
            }
        }

        info!(
            "✅ 验证完成：总计 {} 条，可用 {} 条，失败 {} 条，耗时 {}ms",
            len,
            records.len(),
            len - records.len(),
            start.elapsed().as_millis()
        );
        records
    }

    /// 端点测试路径：每个候选都会得到一条结果，返回数量等于输入数量。
    pub async fn test_many(&self, candidates: Vec<Candidate>, endpoint: &str) -> Vec<EndpointTestResult> {
        info!(
            "🎯 开始测试 {} 条代理 -> {}，并发上限 {}",
            candidates.len(),
            endpoint,
            self.endpoint_limit
        );

        let semaphore = Arc::new(Semaphore::new(self.endpoint_limit));
        let target: Arc<str> = Arc::from(endpoint);

        let tasks: Vec<(Candidate, JoinHandle<_>)> = candidates
            .into_iter()
            .map(|candidate| {
                let probe = Arc::clone(&self.probe);
                let target = Arc::clone(&target);
                let task_candidate = candidate.clone();
                let handle = spawn_gated(&semaphore, async move {
                    validator::test_endpoint(probe.as_ref(), &task_candidate, &target).await
                });
                (candidate, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (candidate, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!("❌ {} 测试任务异常退出：{}", candidate, e);
                    EndpointTestResult::failed(&candidate, endpoint, format!("probe task aborted: {}", e))
                }
            };
            results.push(result);
        }
        results
    }
}

/// 拿到信号量许可后才开始执行 `fut`。信号量从不关闭，许可总能拿到。
fn spawn_gated<F>(semaphore: &Arc<Semaphore>, fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let semaphore = Arc::clone(semaphore);
    tokio::spawn(async move {
        let _permit = semaphore.acquire_owned().await;
        fut.await
    })
}
