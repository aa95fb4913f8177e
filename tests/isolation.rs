use apicheck::engine::run_scenarios;
use apicheck::engine_async::run_scenarios_concurrent;
use apicheck::snapshot::ResponseSnapshot;
use apicheck::transport::{Transport, TransportError};
use apicheck::types::{
    Expectation, Method, RequestDescriptor, RunConfig, Scenario, StatusRule,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;

/// Refuses connections to `down.test`, answers everything else.
struct FlakyTransport;

#[async_trait]
impl Transport for FlakyTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<ResponseSnapshot, TransportError> {
        if request.url.contains("down.test") {
            return Err(TransportError::Connect {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        if request.url.contains("slow.test") {
            return Err(TransportError::Timeout {
                url: request.url.clone(),
                timeout,
            });
        }
        let mut headers = IndexMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Ok(ResponseSnapshot::new(
            200,
            headers,
            br#"{"ok": true}"#.to_vec(),
            Duration::from_millis(1),
        ))
    }
}

fn scenario(id: &str, url: &str) -> Scenario {
    Scenario {
        id: id.to_string(),
        request: RequestDescriptor {
            method: Method::Get,
            url: url.to_string(),
            headers: IndexMap::new(),
            body: None,
        },
        expect: Expectation {
            status: StatusRule::One(200),
            content_type: None,
            headers: Vec::new(),
            predicates: Vec::new(),
        },
    }
}

fn cfg() -> RunConfig {
    RunConfig {
        base_url: "http://up.test".to_string(),
        auth: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn transport_failure_does_not_abort_other_scenarios() {
    let scenarios = vec![
        scenario("a", "http://down.test/health"),
        scenario("b", "/health"),
    ];
    let summary = run_scenarios(&FlakyTransport, &cfg(), &scenarios).await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errored, 1);

    let a = &summary.cases[0];
    assert!(a.errored());
    assert!(!a.passed());
    assert_eq!(a.verdict.mismatches.len(), 1);
    assert_eq!(a.verdict.mismatches[0].check, "transport");
    assert!(a.verdict.mismatches[0].actual.contains("connection refused"));

    let b = &summary.cases[1];
    assert!(b.passed());
    assert!(!b.errored());
}

#[tokio::test]
async fn timeouts_hit_only_their_own_scenario() {
    let scenarios = vec![
        scenario("slow", "http://slow.test/health"),
        scenario("fast", "/health"),
    ];
    let summary = run_scenarios(&FlakyTransport, &cfg(), &scenarios).await;
    assert_eq!(summary.passed, 1);
    assert!(summary.cases[0].error.as_deref().expect("timeout recorded").contains("timed out"));
}

#[tokio::test]
async fn concurrent_runner_preserves_isolation_and_order() {
    let scenarios = vec![
        scenario("a", "http://down.test/health"),
        scenario("b", "/health"),
        scenario("c", "/also-up"),
        scenario("d", "http://down.test/other"),
    ];
    let summary = run_scenarios_concurrent(&FlakyTransport, &cfg(), &scenarios, 4).await;
    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.errored, 2);
    // Slots keep declaration order regardless of completion order
    let ids: Vec<&str> = summary.cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert!(summary.cases[0].errored());
    assert!(summary.cases[1].passed());
}

#[tokio::test]
async fn single_job_concurrency_still_completes_all() {
    let scenarios = vec![scenario("a", "/one"), scenario("b", "/two")];
    let summary = run_scenarios_concurrent(&FlakyTransport, &cfg(), &scenarios, 1).await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 2);
}
