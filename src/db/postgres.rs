//! PostgreSQL 存储模块：基于 [`ProxyStore`] trait 实现代理数据的持久化功能。
//!
//! 使用 `sqlx` 异步驱动，需启用 `postgres` 编译特性。
use crate::common::utils::validate_table_name;
use crate::db::manager::{is_unique_violation, ProxyStore, UpsertOutcome};
use crate::error::{HarvestError, Result};
use crate::model::{Candidate, DbConfig, StoreStats, StoredProxy, ValidationRecord};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info, warn};

/// PostgreSQL 数据库存储实现，持有一个连接池 [`PgPool`]。
#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
    table: String,
}

impl PgStorage {
    /// 创建一个 PostgreSQL 存储实例并自动初始化数据表结构。
    pub async fn new(config: &DbConfig) -> Result<Self> {
        if !validate_table_name(&config.table_name) {
            return Err(HarvestError::InvalidTableName(config.table_name.clone()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await?;

        let storage = Self { pool, table: config.table_name.clone() };
        storage.create_table().await?;
        info!("✅ PostgreSQL 数据库连接成功");
        Ok(storage)
    }

    /// 建表（如果不存在），并设置 `(ip, port, protocol)` 组合唯一约束。
    async fn create_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                ip TEXT NOT NULL,
                port INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                is_working BOOLEAN NOT NULL,
                response_time DOUBLE PRECISION,
                last_checked TIMESTAMPTZ NOT NULL,
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
impl ProxyStore for PgStorage {
    async fn upsert(&self, record: &ValidationRecord) -> Result<UpsertOutcome> {
        let c = &record.candidate;
        let sql = format!(
            r#"
            INSERT INTO {} (ip, port, protocol, is_working, response_time, last_checked, status_code, test_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.table
        );
        let inserted = sqlx::query(&sql)
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
                let sql = format!(
                    "UPDATE {} SET last_checked = $1, response_time = $2 WHERE ip = $3 AND port = $4 AND protocol = $5",
                    self.table
                );
                sqlx::query(&sql)
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
        let sql = format!(
            "SELECT ip, port, protocol, is_working, response_time, last_checked, status_code, test_url FROM {} WHERE is_working = TRUE",
            self.table
        );
        let rows = sqlx::query_as::<_, StoredProxy>(&sql)
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
        let sql = format!(
            "SELECT ip, port, protocol, is_working, response_time, last_checked, status_code, test_url FROM {} WHERE ip = $1 AND port = $2 AND protocol = $3",
            self.table
        );
        let row = sqlx::query_as::<_, StoredProxy>(&sql)
            .bind(&candidate.host)
            .bind(i32::from(candidate.port))
            .bind(candidate.protocol.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ValidationRecord::try_from).transpose()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let sql = format!(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_working) FROM {}",
            self.table
        );
        let (total, working): (i64, i64) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats { total: total as u64, working: working as u64 })
    }
}
