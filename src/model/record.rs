use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::model::candidate::{Candidate, Protocol};

/// 一次探测的结果。
///
/// 只有 `is_working = true` 的记录会被写入存储；同一身份在存储中至多一行，
/// 后续成功探测只刷新 `last_checked` 和 `response_time`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub candidate: Candidate,
    pub is_working: bool,
    /// 响应耗时（秒，保留三位小数）；失败时为 `None`
    pub response_time: Option<f64>,
    pub last_checked: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub test_url: String,
}

impl ValidationRecord {
    pub fn working(candidate: Candidate, response_time: f64, status_code: u16, test_url: &str) -> Self {
        Self {
            candidate,
            is_working: true,
            response_time: Some(response_time),
            last_checked: Utc::now(),
            status_code: Some(status_code),
            test_url: test_url.to_string(),
        }
    }
}

/// 存储中的一行，字段与表结构一一对应。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredProxy {
    pub ip: String,
    pub port: i32,
    pub protocol: String,
    pub is_working: bool,
    pub response_time: Option<f64>,
    pub last_checked: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub test_url: String,
}

impl StoredProxy {
    pub fn candidate(&self) -> Result<Candidate, HarvestError> {
        let protocol: Protocol = self.protocol.parse()?;
        let port = u16::try_from(self.port).map_err(|_| HarvestError::InvalidCandidate {
            host: self.ip.clone(),
            port: 0,
            reason: "port out of range",
        })?;
        Candidate::new(self.ip.clone(), port, protocol)
    }
}

impl TryFrom<StoredProxy> for ValidationRecord {
    type Error = HarvestError;

    fn try_from(row: StoredProxy) -> Result<Self, Self::Error> {
        let candidate = row.candidate()?;
        Ok(Self {
            candidate,
            is_working: row.is_working,
            response_time: row.response_time,
            last_checked: row.last_checked,
            status_code: row.status_code.and_then(|c| u16::try_from(c).ok()),
            test_url: row.test_url,
        })
    }
}

/// 端点测试的结论：拿到了状态码，或者请求本身失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestOutcome {
    Status(u16),
    Error(String),
}

/// 针对指定端点的测试结果，不落库，仅供汇总展示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointTestResult {
    /// `host:port`
    pub proxy: String,
    pub protocol: Protocol,
    pub outcome: TestOutcome,
    pub response_time: Option<f64>,
    pub success: bool,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    /// 200 响应体的前 200 个字符
    pub preview: Option<String>,
}

impl EndpointTestResult {
    pub fn completed(
        candidate: &Candidate,
        endpoint: &str,
        status: u16,
        response_time: f64,
        preview: Option<String>,
    ) -> Self {
        Self {
            proxy: candidate.address(),
            protocol: candidate.protocol,
            outcome: TestOutcome::Status(status),
            response_time: Some(response_time),
            success: status == 200,
            endpoint: endpoint.to_string(),
            timestamp: Utc::now(),
            preview,
        }
    }

    pub fn failed(candidate: &Candidate, endpoint: &str, error: String) -> Self {
        Self {
            proxy: candidate.address(),
            protocol: candidate.protocol,
            outcome: TestOutcome::Error(error),
            response_time: None,
            success: false,
            endpoint: endpoint.to_string(),
            timestamp: Utc::now(),
            preview: None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.outcome {
            TestOutcome::Status(code) => Some(code),
            TestOutcome::Error(_) => None,
        }
    }
}

/// 存储统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub working: u64,
}
