mod cli;
mod common;
mod db;
mod error;
mod fetcher;
mod model;
mod service;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::common::log::init_logging;
use crate::common::utils::minutes;
use crate::db::{ProxyStore, StorageBackend};
use crate::fetcher::SourceFetcher;
use crate::model::AppConfig;
use crate::service::{Coordinator, EndpointTester, Harvester, HttpProbe, Scheduler, Shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    cli.apply(&mut config);

    // 必须在任何日志输出之前调用
    init_logging(&config.log)?;
    info!("🚀 proxy-harvester 启动，命令：{:?}", cli.command);

    let store: Arc<dyn ProxyStore> = Arc::new(
        StorageBackend::connect(&config.db)
            .await
            .with_context(|| format!("无法连接数据库（driver = {}）", config.db.driver))?,
    );

    if cli.command == Command::Stats {
        let stats = store.stats().await?;
        println!("数据库统计：");
        println!("    总计代理：{}", stats.total);
        println!("    可用代理：{}", stats.working);
        return Ok(());
    }

    let probe = Arc::new(HttpProbe::new(&config.verify));
    let coordinator = Coordinator::new(probe, &config.verify);
    let harvester = Harvester::new(
        SourceFetcher::new(&config.fetch)?,
        coordinator.clone(),
        Arc::clone(&store),
        config.sources.clone(),
        config.verify.verification_url.clone(),
    );
    let tester = EndpointTester::new(coordinator, Arc::clone(&store));
    let shutdown = if cli.command.is_loop() {
        Shutdown::on_ctrl_c()
    } else {
        Shutdown::never()
    };
    let scheduler = Scheduler::new(harvester, tester, store, shutdown);

    let endpoint = config.verify.target_endpoint.as_str();
    let schedule = &config.schedule;
    match cli.command {
        Command::Harvest => {
            scheduler.harvest().await;
        }
        Command::Continuous { .. } => {
            scheduler.continuous(minutes(schedule.continuous_interval)).await;
        }
        Command::TestEndpoint { .. } => {
            scheduler.test(endpoint).await;
        }
        Command::Auto { .. } => {
            scheduler
                .automated(minutes(schedule.fetch_interval), minutes(schedule.test_interval), endpoint)
                .await;
        }
        Command::Sequential { .. } => {
            scheduler.sequential(minutes(schedule.cycle_interval), endpoint).await;
        }
        Command::Stats => {}
    }

    info!("👋 proxy-harvester 退出");
    Ok(())
}
