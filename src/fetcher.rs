mod parser;

use parser::{parse_structured_list, parse_text_list};

use crate::common::utils::dedup_candidates;
use crate::error::{HarvestError, Result};
use crate::model::{Candidate, FetchConfig, Source, SourceFormat};
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

/// 来源返回的原始内容
#[derive(Debug, Clone)]
pub enum RawPayload {
    Json(Value),
    Text(String),
}

/// 一轮采集的合并结果
#[derive(Debug, Clone, Default)]
pub struct Harvested {
    /// 去重前的条目数
    pub raw: usize,
    /// 去重后的候选，保持首次出现的顺序
    pub candidates: Vec<Candidate>,
}

/// 负责从各个公开来源拉取代理列表。
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// 拉取单个来源，非 200 视为失败。
    ///
    /// Content-Type 含 `json` 时按 JSON 解析，否则按文本返回。
    pub async fn fetch(&self, source: &Source) -> Result<RawPayload> {
        let resp = self.client.get(&source.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(HarvestError::SourceStatus {
                name: source.name.clone(),
                status: resp.status().as_u16(),
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        if is_json {
            Ok(RawPayload::Json(resp.json::<Value>().await?))
        } else {
            Ok(RawPayload::Text(resp.text().await?))
        }
    }

    /// 拉取并解析单个来源。失败只记录日志，返回空列表。
    pub async fn harvest_source(&self, source: &Source) -> Vec<Candidate> {
        let raw = match self.fetch(source).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[!] 来源 {} 拉取失败：{}", source.name, e);
                return Vec::new();
            }
        };

        let candidates = extract(source, raw);
        info!("{} - 抓取到 {} 条代理", source.name, candidates.len());
        candidates
    }

    /// 并发拉取所有来源，合并后按身份去重。
    ///
    /// 单个来源慢或失败不会阻塞、也不会拖垮其他来源。
    pub async fn harvest_all(&self, sources: &[Source]) -> Harvested {
        info!("========== [代理采集阶段] ==========");
        let results = join_all(sources.iter().map(|s| self.harvest_source(s))).await;

        let merged: Vec<Candidate> = results.into_iter().flatten().collect();
        let raw = merged.len();
        let candidates = dedup_candidates(merged);
        info!("抓取到总共 {} 条代理，去重后 {} 条待验证", raw, candidates.len());
        Harvested { raw, candidates }
    }
}

/// 按来源格式把原始内容转换成候选代理
fn extract(source: &Source, raw: RawPayload) -> Vec<Candidate> {
    match (source.format, raw) {
        (SourceFormat::TextList { protocol }, RawPayload::Text(text)) => parse_text_list(&text, protocol),
        (SourceFormat::TextList { .. }, RawPayload::Json(_)) => {
            debug!("来源 {} 配置为文本列表却返回了 JSON，忽略", source.name);
            Vec::new()
        }
        (SourceFormat::StructuredList, RawPayload::Json(json)) => parse_structured_list(&json),
        // 有些接口返回 JSON 却不带正确的 Content-Type
        (SourceFormat::StructuredList, RawPayload::Text(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(json) => parse_structured_list(&json),
            Err(e) => {
                debug!("来源 {} 的内容不是合法 JSON：{}", source.name, e);
                Vec::new()
            }
        },
    }
}
