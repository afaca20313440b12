use clap::{Parser, Subcommand};

use crate::model::AppConfig;

/// 公开代理采集、验证与端点测试工具
#[derive(Parser, Debug)]
#[command(name = "proxy-harvester", version)]
#[command(about = "Harvest public proxy lists, keep the working ones and test them against an endpoint")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径（未指定时尝试读取当前目录下的 Config.*）
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 数据库连接串，覆盖配置文件中的 db.connection_string
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// 单次探测超时（秒）
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 执行一轮采集并写入可用代理
    Harvest,
    /// 按固定间隔持续采集
    Continuous {
        /// 间隔（分钟）
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// 用存储中的可用代理测试目标端点
    TestEndpoint {
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// 采集与测试各按自己的间隔自动运行
    Auto {
        /// 采集间隔（分钟）
        #[arg(long)]
        fetch_interval: Option<u64>,
        /// 测试间隔（分钟）
        #[arg(long)]
        test_interval: Option<u64>,
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// 采集 → 测试 → 等待，单一周期循环
    Sequential {
        /// 周期（分钟）
        #[arg(long)]
        cycle_interval: Option<u64>,
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// 打印数据库统计
    Stats,
}

impl Command {
    /// 长时间运行、需要响应 Ctrl-C 的命令
    pub fn is_loop(&self) -> bool {
        matches!(self, Command::Continuous { .. } | Command::Auto { .. } | Command::Sequential { .. })
    }
}

impl Cli {
    /// 命令行参数拥有最高优先级，覆盖配置中的对应项。
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(database) = &self.database {
            config.db.connection_string = database.clone();
        }
        if let Some(timeout) = self.timeout {
            config.verify.timeout = timeout;
        }

        match &self.command {
            Command::Continuous { interval } => {
                if let Some(v) = interval {
                    config.schedule.continuous_interval = *v;
                }
            }
            Command::TestEndpoint { endpoint } => override_endpoint(config, endpoint),
            Command::Auto { fetch_interval, test_interval, endpoint } => {
                if let Some(v) = fetch_interval {
                    config.schedule.fetch_interval = *v;
                }
                if let Some(v) = test_interval {
                    config.schedule.test_interval = *v;
                }
                override_endpoint(config, endpoint);
            }
            Command::Sequential { cycle_interval, endpoint } => {
                if let Some(v) = cycle_interval {
                    config.schedule.cycle_interval = *v;
                }
                override_endpoint(config, endpoint);
            }
            Command::Harvest | Command::Stats => {}
        }
    }
}

fn override_endpoint(config: &mut AppConfig, endpoint: &Option<String>) {
    if let Some(endpoint) = endpoint {
        config.verify.target_endpoint = endpoint.clone();
    }
}
