use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::source::{default_sources, Source};

const DEFAULT_CONFIG_FILE: &str = "Config";
const ENV_PREFIX: &str = "PROXY_HARVEST";

/// 程序配置。
///
/// 所有字段都有默认值，没有配置文件也能直接运行。
/// 优先级：默认值 < 配置文件 < `PROXY_HARVEST__*` 环境变量 < 命令行参数。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub verify: VerifyConfig,
    pub fetch: FetchConfig,
    pub db: DbConfig,
    pub log: LoggingConfig,
    pub schedule: ScheduleConfig,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub driver: String,
    pub connection_string: String,
    pub table_name: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// 单次探测超时（秒）
    pub timeout: u64,
    /// 采集验证阶段的最大并发探测数
    pub harvest_concurrency: usize,
    /// 端点测试阶段的最大并发探测数
    pub endpoint_concurrency: usize,
    /// 采集阶段用来判定存活的固定地址
    pub verification_url: String,
    /// 端点测试的默认目标
    pub target_endpoint: String,
    /// http 代理是否同时用于 https 目标
    pub http_proxies_https: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// 拉取来源列表的超时（秒）
    pub timeout: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub console_levels: Vec<String>,
    pub dir: String,
    /// 文件日志的 EnvFilter 指令
    pub file_filter: String,
}

/// 各循环模式的间隔（分钟）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub fetch_interval: u64,
    pub test_interval: u64,
    pub cycle_interval: u64,
    pub continuous_interval: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verify: VerifyConfig::default(),
            fetch: FetchConfig::default(),
            db: DbConfig::default(),
            log: LoggingConfig::default(),
            schedule: ScheduleConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            connection_string: "sqlite://proxydb.sqlite?mode=rwc".to_string(),
            table_name: "working_proxies".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout: 8,
            harvest_concurrency: 120,
            endpoint_concurrency: 50,
            verification_url: "http://httpbin.org/ip".to_string(),
            target_endpoint: "http://16.171.170.83:3000/".to_string(),
            http_proxies_https: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 20,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_levels: vec!["info".into(), "warn".into(), "error".into()],
            dir: "logs".to_string(),
            file_filter: "info,proxy_harvester=debug".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval: 60,
            test_interval: 30,
            cycle_interval: 10,
            continuous_interval: 30,
        }
    }
}

impl VerifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl AppConfig {
    /// 加载配置。
    ///
    /// 未指定 `path` 时尝试读取当前目录下可选的 `Config.{toml,yaml,json}`；
    /// 显式指定的文件必须存在。
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("log.console_levels"),
            )
            .build()?;
        let config = config.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;
    use crate::model::SourceFormat;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.verify.timeout(), Duration::from_secs(8));
        assert_eq!(config.verify.harvest_concurrency, 120);
        assert_eq!(config.verify.endpoint_concurrency, 50);
        assert_ne!(config.verify.verification_url, config.verify.target_endpoint);
        assert_eq!(config.db.table_name, "working_proxies");
        assert_eq!(config.schedule.fetch_interval, 60);
        assert_eq!(config.schedule.test_interval, 30);
        assert_eq!(config.sources.len(), 9);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("proxy_harvest_cfg_{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[verify]
timeout = 3
harvest_concurrency = 10

[[sources]]
name = "local"
url = "http://127.0.0.1:9/list.txt"
format = {{ kind = "text_list", protocol = "socks5" }}
"#
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.verify.timeout, 3);
        assert_eq!(config.verify.harvest_concurrency, 10);
        assert_eq!(config.verify.endpoint_concurrency, 50);
        assert_eq!(config.db.driver, "sqlite");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(
            config.sources[0].format,
            SourceFormat::TextList { protocol: Protocol::Socks5 }
        );
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(AppConfig::load(Some("/definitely/not/here/proxy_harvest")).is_err());
    }
}
