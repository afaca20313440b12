use anyhow::Context;
use std::fs::{create_dir_all, OpenOptions};
use std::path::Path;
use tracing::{Level, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use crate::common::utils::parse_level;
use crate::model::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let file_filter = EnvFilter::try_new(&config.file_filter)
        .with_context(|| format!("无效的 log.file_filter：{}", config.file_filter))?;

    let log_dir = Path::new(&config.dir);
    create_dir_all(log_dir)?;

    let allowed_levels: Vec<Level> = config
        .console_levels
        .iter()
        .filter_map(|lvl_str| parse_level(lvl_str))
        .collect();

    // 文件日志：追加写入，级别由 EnvFilter 指令控制
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("all.log"))?;
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(file_filter);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(filter_fn(move |metadata: &Metadata| {
            allowed_levels.contains(metadata.level())
        }));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    Ok(())
}
