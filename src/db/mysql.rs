//! MySQL 存储模块，需启用 `mysql` 编译特性。
//!
//! MySQL 的唯一索引不能直接建在 TEXT 列上，所以身份列使用 VARCHAR。
use crate::common::utils::validate_table_name;
use crate::db::manager::{is_unique_violation, ProxyStore, UpsertOutcome};
use crate::error::{HarvestError, Result};
use crate::model::{Candidate, DbConfig, StoreStats, StoredProxy, ValidationRecord};
use async_trait::async_trait;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct MySqlStorage {
    pool: MySqlPool,
    table: String,
}

impl MySqlStorage {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        if !validate_table_name(&config.table_name) {
            return Err(HarvestError::InvalidTableName(config.table_name.clone()));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await?;

        let storage = Self { pool, table: config.table_name.clone() };
        storage.create_table().await?;
        info!("✅ MySQL 数据库连接成功");
        Ok(storage)
    }

    async fn create_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                ip VARCHAR(255) NOT NULL,
                port INT NOT NULL,
                protocol VARCHAR(16) NOT NULL,
                is_working BOOLEAN NOT NULL,
                response_time DOUBLE,
                last_checked DATETIME(6) NOT NULL,
                status_code INT,
                test_url TEXT NOT NULL,
                UNIQUE KEY uniq_identity (ip, port, protocol)
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
impl ProxyStore for MySqlStorage {
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
            "SELECT ip, port, protocol, is_working, response_time, last_checked, status_code, test_url FROM {} WHERE is_working = TRUE",
            self.table
        ))
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
            "SELECT COUNT(*) FROM {} WHERE is_working = TRUE",
            self.table
        ))
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats { total: total as u64, working: working as u64 })
    }
}
