//! 探测结果的两种解读方式。
//!
//! 采集阶段只关心"是否可用"，失败直接丢弃；
//! 端点测试阶段每次尝试都要留下结果，失败也要带上错误信息。

use tracing::debug;

use crate::common::utils::round3;
use crate::model::{Candidate, EndpointTestResult, ValidationRecord};
use crate::service::probe::{Probe, ProbeOutcome};

/// 采集路径：仅当探测完成且状态码为 200 时返回可用记录。
pub async fn validate<P: Probe + ?Sized>(
    probe: &P,
    candidate: Candidate,
    target_url: &str,
) -> Option<ValidationRecord> {
    match probe.probe(&candidate, target_url).await {
        ProbeOutcome::Completed { status: 200, elapsed, .. } => Some(ValidationRecord::working(
            candidate,
            round3(elapsed.as_secs_f64()),
            200,
            target_url,
        )),
        ProbeOutcome::Completed { status, .. } => {
            debug!("{} 返回状态码 {}，丢弃", candidate, status);
            None
        }
        ProbeOutcome::Failed(e) => {
            debug!("{} 探测失败：{}", candidate, e);
            None
        }
    }
}

/// 端点测试路径：无论成败都返回一条结果。
pub async fn test_endpoint<P: Probe + ?Sized>(
    probe: &P,
    candidate: &Candidate,
    endpoint: &str,
) -> EndpointTestResult {
    match probe.probe(candidate, endpoint).await {
        ProbeOutcome::Completed { status, elapsed, preview } => {
            let response_time = round3(elapsed.as_secs_f64());
            debug!("[+] {} -> 状态码 {}，耗时 {}s", candidate, status, response_time);
            EndpointTestResult::completed(candidate, endpoint, status, response_time, preview)
        }
        ProbeOutcome::Failed(e) => {
            debug!("[-] {} -> 失败：{}", candidate, e);
            EndpointTestResult::failed(candidate, endpoint, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Protocol, TestOutcome};
    use crate::service::probe::HttpProbe;
    use crate::service::testing::{refused_port, FakeProxy, TARGET};
    use crate::model::VerifyConfig;

    fn probe() -> HttpProbe {
        HttpProbe::new(&VerifyConfig { timeout: 5, ..VerifyConfig::default() })
    }

    fn local(port: u16) -> Candidate {
        Candidate::new("127.0.0.1", port, Protocol::Http).unwrap()
    }

    #[tokio::test]
    async fn test_validate_working_proxy() {
        let proxy = FakeProxy::start(200, "{}").await;
        let record = validate(&probe(), local(proxy.port), TARGET).await.unwrap();

        assert!(record.is_working);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.test_url, TARGET);
        assert!(record.response_time.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_validate_drops_non_200_and_errors() {
        let proxy = FakeProxy::start(502, "bad gateway").await;
        assert!(validate(&probe(), local(proxy.port), TARGET).await.is_none());
        assert!(validate(&probe(), local(refused_port()), TARGET).await.is_none());
    }

    #[tokio::test]
    async fn test_endpoint_records_every_attempt() {
        let ok_proxy = FakeProxy::start(200, "hello").await;
        let ok = test_endpoint(&probe(), &local(ok_proxy.port), TARGET).await;
        assert!(ok.success);
        assert_eq!(ok.preview.as_deref(), Some("hello"));

        let denied_proxy = FakeProxy::start(404, "nope").await;
        let denied = test_endpoint(&probe(), &local(denied_proxy.port), TARGET).await;
        assert!(!denied.success);
        assert_eq!(denied.outcome, TestOutcome::Status(404));
        assert!(denied.response_time.is_some());

        let refused = test_endpoint(&probe(), &local(refused_port()), TARGET).await;
        assert!(!refused.success);
        assert!(matches!(refused.outcome, TestOutcome::Error(_)));
        assert!(refused.response_time.is_none());
    }
}
