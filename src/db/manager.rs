//! 存储模块：支持多种数据库后端的代理数据读写接口。
//!
//! 支持的后端包括：SQLite、MySQL、PostgreSQL（按编译特性启用）
//! 提供统一的异步 trait [`ProxyStore`]，便于通过 [`StorageBackend`] 多态调度。
//!
//! 写入统一走"先插入、唯一约束冲突再更新"的协议，见 [`ProxyStore::upsert`]。
use async_trait::async_trait;
#[cfg(feature = "mysql")]
use crate::db::mysql::MySqlStorage;
#[cfg(feature = "postgres")]
use crate::db::postgres::PgStorage;
#[cfg(feature = "sqlite")]
use crate::db::sqlite::SqliteStorage;
use crate::error::{HarvestError, Result};
use crate::model::{Candidate, DbConfig, StoreStats, ValidationRecord};

/// 一次写入最终落到了哪条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新身份，插入了一行
    Inserted,
    /// 身份已存在，只刷新了 `last_checked` 与 `response_time`
    Refreshed,
}

/// 定义代理存储操作的通用异步接口。
///
/// 存储以 `(ip, port, protocol)` 为唯一键，每个身份至多一行。
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// 插入一条可用记录；若身份已存在（唯一约束冲突），
    /// 改为更新该行的 `last_checked` 与 `response_time`，其余字段保持不变。
    ///
    /// 唯一约束冲突在内部消化，不会作为错误返回。
    async fn upsert(&self, record: &ValidationRecord) -> Result<UpsertOutcome>;

    /// 列出所有 `is_working = true` 的代理，不分页。
    async fn find_working(&self) -> Result<Vec<Candidate>>;

    /// 按身份查找完整记录。
    async fn find(&self, candidate: &Candidate) -> Result<Option<ValidationRecord>>;

    /// 总行数与可用行数。
    async fn stats(&self) -> Result<StoreStats>;
}

/// 判断数据库错误是否为唯一约束冲突
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// 数据库后端枚举，按启用特性动态支持多种数据库驱动。
///
/// 编译期通过 `features = ["sqlite", "mysql", "postgres"]` 控制可用性。
/// 运行时通过 `db.driver` 选择使用哪种后端。
#[derive(Debug)]
pub enum StorageBackend {
    /// SQLite 存储实现（轻量、文件型）
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStorage),

    /// MySQL 存储实现
    #[cfg(feature = "mysql")]
    MySql(MySqlStorage),

    /// PostgreSQL 存储实现
    #[cfg(feature = "postgres")]
    Postgres(PgStorage),
}

impl StorageBackend {
    /// 根据配置项创建对应的数据库后端实例。
    ///
    /// 依据 `config.driver`（"sqlite", "mysql", "postgres"）创建相应的后端；
    /// 连接失败或驱动未编译进来都会返回错误，由调用方视为致命配置错误。
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        match config.driver.to_ascii_lowercase().as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Self::Sqlite(SqliteStorage::new(config).await?)),
            #[cfg(feature = "mysql")]
            "mysql" => Ok(Self::MySql(MySqlStorage::new(config).await?)),
            #[cfg(feature = "postgres")]
            "postgres" | "postgresql" => Ok(Self::Postgres(PgStorage::new(config).await?)),
            other => Err(HarvestError::UnsupportedDriver(other.to_string())),
        }
    }
}

#[async_trait]
impl ProxyStore for StorageBackend {
    async fn upsert(&self, record: &ValidationRecord) -> Result<UpsertOutcome> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.upsert(record).await,
            #[cfg(feature = "mysql")]
            Self::MySql(s) => s.upsert(record).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.upsert(record).await,
        }
    }

    async fn find_working(&self) -> Result<Vec<Candidate>> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.find_working().await,
            #[cfg(feature = "mysql")]
            Self::MySql(s) => s.find_working().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.find_working().await,
        }
    }

    async fn find(&self, candidate: &Candidate) -> Result<Option<ValidationRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.find(candidate).await,
            #[cfg(feature = "mysql")]
            Self::MySql(s) => s.find(candidate).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.find(candidate).await,
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.stats().await,
            #[cfg(feature = "mysql")]
            Self::MySql(s) => s.stats().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.stats().await,
        }
    }
}
