//! # scheduler 模块
//!
//! 长时间运行的三种循环模式，均由 tokio 定时器驱动：
//!
//! - `continuous`：按固定间隔重复采集；
//! - `automated`：采集与端点测试各用一个独立的节拍器；
//! - `sequential`：采集 → 统计 → 测试 → 汇总，然后等待本轮剩余的时间。
//!
//! 退出信号只在两轮之间和等待期间检查，正在进行的一轮总会跑完。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::db::ProxyStore;
use crate::service::harvest::{HarvestReport, Harvester};
use crate::service::probe::Probe;
use crate::service::tester::{EndpointTester, TestSummary};

/// tokio 节拍器不接受零周期
const MIN_PERIOD: Duration = Duration::from_secs(1);
/// 周期上限，`Instant` 加上更长的时长会溢出
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

fn ticker_period(every: Duration) -> Duration {
    every.clamp(MIN_PERIOD, MAX_PERIOD)
}

/// 协作式退出信号
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// 收到 Ctrl-C 时触发
    pub fn on_ctrl_c() -> Self {
        let (tx, shutdown) = Self::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 收到中断信号，当前一轮结束后退出");
                    let _ = tx.send(true);
                }
                Err(e) => error!("监听中断信号失败：{}", e),
            }
        });
        shutdown
    }

    /// 永不触发，用于跑完一次就退出的命令
    pub fn never() -> Self {
        Self::channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待信号触发；发送端消失且从未触发时永远挂起。
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 一次循环运行结束时的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub harvests: usize,
    pub tests: usize,
}

pub struct Scheduler<P: Probe> {
    harvester: Harvester<P>,
    tester: EndpointTester<P>,
    store: Arc<dyn ProxyStore>,
    shutdown: Shutdown,
}

impl<P: Probe> Scheduler<P> {
    pub fn new(
        harvester: Harvester<P>,
        tester: EndpointTester<P>,
        store: Arc<dyn ProxyStore>,
        shutdown: Shutdown,
    ) -> Self {
        Self { harvester, tester, store, shutdown }
    }

    pub async fn harvest(&self) -> HarvestReport {
        let report = self.harvester.run_once().await;
        self.log_stats().await;
        report
    }

    /// 测试可用集合并打印汇总；读取存储失败时记录错误并返回 `None`。
    pub async fn test(&self, endpoint: &str) -> Option<TestSummary> {
        match self.tester.test_all_proxies_against_endpoint(endpoint).await {
            Ok(results) => {
                let summary = TestSummary::from_results(&results);
                summary.log();
                Some(summary)
            }
            Err(e) => {
                error!("❌ 端点测试失败：{}", e);
                None
            }
        }
    }

    pub async fn log_stats(&self) {
        match self.store.stats().await {
            Ok(stats) => info!("📊 数据库统计：总计 {} 条，可用 {} 条", stats.total, stats.working),
            Err(e) => error!("❌ 读取数据库统计失败：{}", e),
        }
    }

    pub async fn continuous(&self, every: Duration) -> LoopStats {
        info!("🔁 持续采集模式，间隔 {} 分钟", every.as_secs() / 60);
        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(ticker_period(every));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = LoopStats::default();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }
            stats.harvests += 1;
            info!("========== [第 {} 轮采集] ==========", stats.harvests);
            self.harvest().await;
        }
        info!("持续采集模式结束，共运行 {} 轮", stats.harvests);
        stats
    }

    /// 先各执行一次，再由两个独立节拍器分别驱动采集和测试。
    pub async fn automated(&self, fetch_every: Duration, test_every: Duration, endpoint: &str) -> LoopStats {
        info!(
            "🤖 自动模式：采集间隔 {} 分钟，测试间隔 {} 分钟，目标 {}",
            fetch_every.as_secs() / 60,
            test_every.as_secs() / 60,
            endpoint
        );
        let mut shutdown = self.shutdown.clone();
        let mut stats = LoopStats::default();
        if shutdown.is_triggered() {
            return stats;
        }

        self.harvest().await;
        stats.harvests += 1;
        self.test(endpoint).await;
        stats.tests += 1;

        let fetch_every = ticker_period(fetch_every);
        let test_every = ticker_period(test_every);
        let now = Instant::now();
        let mut fetch_ticker = interval_at(now + fetch_every, fetch_every);
        let mut test_ticker = interval_at(now + test_every, test_every);
        fetch_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        test_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = fetch_ticker.tick() => {
                    self.harvest().await;
                    stats.harvests += 1;
                }
                _ = test_ticker.tick() => {
                    self.test(endpoint).await;
                    stats.tests += 1;
                }
            }
        }
        info!("自动模式结束：采集 {} 次，测试 {} 次", stats.harvests, stats.tests);
        stats
    }

    /// 单一节拍：一轮做完再等待剩余时间；超时的一轮结束后立即开始下一轮。
    pub async fn sequential(&self, cycle: Duration, endpoint: &str) -> LoopStats {
        info!("🔂 顺序模式：周期 {} 分钟，目标 {}", cycle.as_secs() / 60, endpoint);
        let cycle = cycle.min(MAX_PERIOD);
        let mut shutdown = self.shutdown.clone();
        let mut stats = LoopStats::default();

        while !shutdown.is_triggered() {
            let started = Instant::now();
            info!("========== [第 {} 轮] ==========", stats.harvests + 1);

            self.harvest().await;
            stats.harvests += 1;
            self.test(endpoint).await;
            stats.tests += 1;

            let elapsed = started.elapsed();
            match cycle.checked_sub(elapsed) {
                Some(wait) if !wait.is_zero() => {
                    info!("本轮耗时 {:.1}s，{:.1}s 后开始下一轮", elapsed.as_secs_f64(), wait.as_secs_f64());
                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => break,
                        _ = sleep(wait) => {}
                    }
                }
                _ => warn!("本轮耗时 {:.1}s 超过周期，立即开始下一轮", elapsed.as_secs_f64()),
            }
        }
        info!("顺序模式结束，共运行 {} 轮", stats.harvests);
        stats
    }
}
