//! # harvest 模块
//!
//! 一次完整的采集流程：并发拉取所有来源 → 合并去重 → 有界并发验证 → 可用代理写入存储。
//!
//! 单个来源或单条写入失败只记录日志，不会中断整轮采集。

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::db::{ProxyStore, UpsertOutcome};
use crate::fetcher::SourceFetcher;
use crate::model::Source;
use crate::service::coordinator::Coordinator;
use crate::service::probe::Probe;

/// 一轮采集的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub sources: usize,
    /// 去重前抓取到的条目数
    pub harvested: usize,
    pub unique: usize,
    /// 验证通过的数量
    pub working: usize,
    pub inserted: usize,
    pub refreshed: usize,
    pub failed_writes: usize,
}

impl HarvestReport {
    pub fn log(&self) {
        info!("========== [采集统计] ==========");
        info!(
            "来源 {} 个，抓取 {} 条，去重后 {} 条，可用 {} 条",
            self.sources, self.harvested, self.unique, self.working
        );
        info!(
            "新增 {} 条，刷新 {} 条，写入失败 {} 条",
            self.inserted, self.refreshed, self.failed_writes
        );
    }
}

pub struct Harvester<P: Probe> {
    fetcher: SourceFetcher,
    coordinator: Coordinator<P>,
    store: Arc<dyn ProxyStore>,
    sources: Vec<Source>,
    verification_url: String,
}

impl<P: Probe> Harvester<P> {
    pub fn new(
        fetcher: SourceFetcher,
        coordinator: Coordinator<P>,
        store: Arc<dyn ProxyStore>,
        sources: Vec<Source>,
        verification_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            coordinator,
            store,
            sources,
            verification_url: verification_url.into(),
        }
    }

    pub async fn run_once(&self) -> HarvestReport {
        let harvested = self.fetcher.harvest_all(&self.sources).await;
        let mut report = HarvestReport {
            sources: self.sources.len(),
            harvested: harvested.raw,
            unique: harvested.candidates.len(),
            ..HarvestReport::default()
        };

        let records = self
            .coordinator
            .validate_many(harvested.candidates, &self.verification_url)
            .await;
        report.working = records.len();

        info!("========== [存储阶段] ==========");
        for record in &records {
            match self.store.upsert(record).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Refreshed) => report.refreshed += 1,
                Err(e) => {
                    report.failed_writes += 1;
                    error!("❌ 写入 {} 失败：{}", record.candidate, e);
                }
            }
        }

        report.log();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::memory_storage;
    use crate::error::{HarvestError, Result};
    use crate::model::{Candidate, FetchConfig, Protocol, StoreStats, ValidationRecord, VerifyConfig};
    use crate::service::probe::HttpProbe;
    use crate::service::testing::{even_ports_work, refused_port, CountingProbe, FakeProxy, TARGET};
    use async_trait::async_trait;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_list(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(&FetchConfig { timeout: 5, ..FetchConfig::default() }).unwrap()
    }

    #[tokio::test]
    async fn test_harvest_end_to_end() {
        let live = FakeProxy::start(200, r#"{"origin":"127.0.0.1"}"#).await;
        let dead = refused_port();

        let server = MockServer::start().await;
        serve_list(&server, "/a.txt", format!("127.0.0.1:{}\n127.0.0.1:{}\n", live.port, dead)).await;
        serve_list(&server, "/b.txt", format!("127.0.0.1:{}\n", live.port)).await;

        let sources = vec![
            Source::text("a_http", &format!("{}/a.txt", server.uri()), Protocol::Http),
            Source::text("b_http", &format!("{}/b.txt", server.uri()), Protocol::Http),
        ];

        let store: Arc<dyn ProxyStore> = Arc::new(memory_storage().await);
        let probe = Arc::new(HttpProbe::new(&VerifyConfig { timeout: 5, ..VerifyConfig::default() }));
        let harvester = Harvester::new(
            fetcher(),
            Coordinator::with_limits(probe, 8, 8),
            Arc::clone(&store),
            sources,
            TARGET,
        );

        let report = harvester.run_once().await;
        assert_eq!(
            report,
            HarvestReport {
                sources: 2,
                harvested: 3,
                unique: 2,
                working: 1,
                inserted: 1,
                refreshed: 0,
                failed_writes: 0,
            }
        );

        let working = store.find_working().await.unwrap();
        assert_eq!(working, vec![Candidate::new("127.0.0.1", live.port, Protocol::Http).unwrap()]);

        // 再跑一轮只会刷新，不会新增行
        let again = harvester.run_once().await;
        assert_eq!(again.inserted, 0);
        assert_eq!(again.refreshed, 1);
        assert_eq!(store.stats().await.unwrap(), StoreStats { total: 1, working: 1 });
    }

    struct BrokenStore;

    #[async_trait]
    impl ProxyStore for BrokenStore {
        async fn upsert(&self, _record: &ValidationRecord) -> Result<UpsertOutcome> {
            Err(HarvestError::IOError(std::io::Error::other("disk full")))
        }
        async fn find_working(&self) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn find(&self, _candidate: &Candidate) -> Result<Option<ValidationRecord>> {
            Ok(None)
        }
        async fn stats(&self) -> Result<StoreStats> {
            Ok(StoreStats::default())
        }
    }

    #[tokio::test]
    async fn test_store_failures_do_not_abort_harvest() {
        let server = MockServer::start().await;
        serve_list(&server, "/list.txt", "1.1.1.1:8000\n1.1.1.1:8001\n1.1.1.1:8002\n".into()).await;

        let probe = Arc::new(CountingProbe::new(Duration::ZERO, even_ports_work));
        let harvester = Harvester::new(
            fetcher(),
            Coordinator::with_limits(Arc::clone(&probe), 8, 8),
            Arc::new(BrokenStore),
            vec![Source::text("list_http", &format!("{}/list.txt", server.uri()), Protocol::Http)],
            TARGET,
        );

        let report = harvester.run_once().await;
        assert_eq!(probe.calls(), 3);
        assert_eq!(report.working, 2);
        assert_eq!(report.failed_writes, 2);
        assert_eq!(report.inserted + report.refreshed, 0);
    }
}
