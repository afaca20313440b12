//! SQLite 存储模块
//!
//! 通过 `SqliteStorage` 结构体封装数据库连接池，
//! 并实现了 `ProxyStore` trait，
//! 方便上层调用统一接口操作代理数据。
//!
//! 表名来自配置，建表前会做合法性校验。
//! 适用于轻量级单机环境，也是测试使用的后端（`sqlite::memory:`）。

use crate::common::utils::validate_table_name;
use crate::db::manager::{is_unique_violation, ProxyStore, UpsertOutcome};
use crate::error::{HarvestError, Result};
use crate::model::{Candidate, DbConfig, StoreStats, StoredProxy, ValidationRecord};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
    table: String,
}

impl SqliteStorage {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        if !validate_table_name(&config.table_name) {
            return Err(HarvestError::InvalidTableName(config.table_name.clone()));
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await?;

        let storage = Self { pool, table: config.table_name.clone() };
        storage.create_table().await?;
        info!("✅ SQLite 数据库连接成功");
        Ok(storage)
    }

    async fn create_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                port INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                is_working BOOLEAN NOT NULL,
                response_time REAL,
                last_checked TEXT NOT NULL,
                status_code INTEGER,
                test_url TEXT NOT NULL,
                UNIQUE(ip, port, protocol)
            );
            "#,
            self.table
        ))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyStore for SqliteStorage {
    async fn upsert(&self, record: &ValidationRecord) -> Result<UpsertOutcome> {
        let c = &record.candidate;
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO {} (ip, port, protocol, is_working, response_time, last_checked, status_code, test_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            self.table
        ))
            .bind(&c.host)
            .bind(i32::from(c.port))
            .bind(c.protocol.as_str())
            .bind(record.is_working)
            .bind(record.response_time)
            .bind(record.last_checked)
            .bind(record.status_code.map(i32::from))
            .bind(&record.test_url)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {
                info!("[+] 新增可用代理：{}", c);
                Ok(UpsertOutcome::Inserted)
            }
            Err(e) if is_unique_violation(&e) => {
                sqlx::query(&format!(
                    "UPDATE {} SET last_checked = ?, response_time = ? WHERE ip = ? AND port = ? AND protocol = ?",
                    self.table
                ))
                    .bind(record.last_checked)
                    .bind(record.response_time)
                    .bind(&c.host)
                    .bind(i32::from(c.port))
                    .bind(c.protocol.as_str())
                    .execute(&self.pool)
                    .await?;
                debug!("刷新已有代理：{}", c);
                Ok(UpsertOutcome::Refreshed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_working(&self) -> Result<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, StoredProxy>(&format!(
            "SELECT ip, port, protocol, is_working, response_time, last_checked, status_code, test_url FROM {} WHERE is_working = ?",
            self.table
        ))
            .bind(true)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match row.candidate() {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("跳过无法识别的记录 {}:{}：{}", row.ip, row.port, e);
                    None
                }
            })
            .collect())
    }

    async fn find(&self, candidate: &Candidate) -> Result<Option<ValidationRecord>> {
        let row = sqlx::query_as::<_, StoredProxy>(&format!(
            "SELECT ip, port, protocol, is_working, response_time, last_checked, status_code, test_url FROM {} WHERE ip = ? AND port = ? AND protocol = ?",
            self.table
        ))
            .bind(&candidate.host)
            .bind(i32::from(candidate.port))
            .bind(candidate.protocol.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ValidationRecord::try_from).transpose()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        let working: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE is_working = ?",
            self.table
        ))
            .bind(true)
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats { total: total as u64, working: working as u64 })
    }
}

#[cfg(test)]
pub(crate) async fn memory_storage() -> SqliteStorage {
    let config = DbConfig {
        connection_string: "sqlite::memory:".into(),
        max_connections: 1,
        ..DbConfig::default()
    };
    SqliteStorage::new(&config).await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;
    use chrono::{Duration, Utc};

    fn record(host: &str, port: u16, protocol: Protocol, response_time: f64) -> ValidationRecord {
        let candidate = Candidate::new(host, port, protocol).unwrap();
        ValidationRecord::working(candidate, response_time, 200, "http://httpbin.org/ip")
    }

    #[tokio::test]
    async fn test_rejects_bad_table_name() {
        let config = DbConfig {
            connection_string: "sqlite::memory:".into(),
            table_name: "proxies; DROP TABLE x".into(),
            max_connections: 1,
            ..DbConfig::default()
        };
        let err = SqliteStorage::new(&config).await.unwrap_err();
        assert!(matches!(err, HarvestError::InvalidTableName(_)));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let storage = memory_storage().await;
        let base = Utc::now();

        let mut last = None;
        for i in 0..5 {
            let mut r = record("1.2.3.4", 8080, Protocol::Http, 1.0 + i as f64);
            r.last_checked = base + Duration::seconds(i);
            let outcome = storage.upsert(&r).await.unwrap();
            assert_eq!(outcome, if i == 0 { UpsertOutcome::Inserted } else { UpsertOutcome::Refreshed });
            last = Some(r);
        }
        let last = last.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats, StoreStats { total: 1, working: 1 });

        let stored = storage.find(&last.candidate).await.unwrap().unwrap();
        assert_eq!(stored.response_time, last.response_time);
        assert_eq!(stored.last_checked.timestamp_millis(), last.last_checked.timestamp_millis());
    }

    #[tokio::test]
    async fn test_refresh_leaves_other_fields_untouched() {
        let storage = memory_storage().await;

        let first = record("1.2.3.4", 1080, Protocol::Socks5, 0.8);
        storage.upsert(&first).await.unwrap();

        let mut second = record("1.2.3.4", 1080, Protocol::Socks5, 0.3);
        second.status_code = Some(299);
        second.test_url = "http://elsewhere/".into();
        storage.upsert(&second).await.unwrap();

        let stored = storage.find(&first.candidate).await.unwrap().unwrap();
        assert_eq!(stored.response_time, Some(0.3));
        assert_eq!(stored.status_code, Some(200));
        assert_eq!(stored.test_url, "http://httpbin.org/ip");
    }

    #[tokio::test]
    async fn test_identity_includes_protocol() {
        let storage = memory_storage().await;
        storage.upsert(&record("1.2.3.4", 1080, Protocol::Socks4, 0.5)).await.unwrap();
        storage.upsert(&record("1.2.3.4", 1080, Protocol::Socks5, 0.5)).await.unwrap();
        storage.upsert(&record("1.2.3.4", 1081, Protocol::Socks5, 0.5)).await.unwrap();

        assert_eq!(storage.stats().await.unwrap().total, 3);

        let mut working = storage.find_working().await.unwrap();
        working.sort_by_key(|c| (c.port, c.protocol.as_str()));
        assert_eq!(working.len(), 3);
        assert_eq!(working[0].protocol, Protocol::Socks4);
    }

    #[tokio::test]
    async fn test_find_missing() {
        let storage = memory_storage().await;
        let c = Candidate::new("9.9.9.9", 53, Protocol::Http).unwrap();
        assert!(storage.find(&c).await.unwrap().is_none());
        assert!(storage.find_working().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_converge() {
        let storage = std::sync::Arc::new(memory_storage().await);

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage.upsert(&record("7.7.7.7", 3128, Protocol::Http, i as f64)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(storage.stats().await.unwrap().total, 1);
    }
}
