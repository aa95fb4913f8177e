use apicheck::engine::run_scenarios;
use apicheck::report::render_human;
use apicheck::snapshot::ResponseSnapshot;
use apicheck::transport::{Transport, TransportError};
use apicheck::types::{
    Expectation, FieldPath, Method, Predicate, RequestDescriptor, RunConfig, Scenario, StatusRule,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;
use std::time::Duration;

const TITLE: &str = "sunt aut facere repellat provident occaecati excepturi optio reprehenderit";

/// Serves canned JSONPlaceholder-shaped responses.
struct PostsService;

fn json_response(status: u16, body: serde_json::Value) -> ResponseSnapshot {
    let mut headers = IndexMap::new();
    headers.insert(
        "content-type".to_string(),
        "application/json; charset=utf-8".to_string(),
    );
    ResponseSnapshot::new(
        status,
        headers,
        serde_json::to_vec(&body).expect("serializable body"),
        Duration::from_millis(3),
    )
}

#[async_trait]
impl Transport for PostsService {
    async fn send(
        &self,
        request: &RequestDescriptor,
        _timeout: Duration,
    ) -> Result<ResponseSnapshot, TransportError> {
        match (request.method, request.url.as_str()) {
            (Method::Get, "http://posts.test/posts/1") => Ok(json_response(
                200,
                json!({
                    "id": 1,
                    "title": TITLE,
                    "body": "quia et suscipit suscipit recusandae",
                    "userId": 1,
                }),
            )),
            (Method::Post, "http://posts.test/posts") => {
                let mut body = request.body.clone().expect("POST carries a body");
                body["id"] = json!(101);
                Ok(json_response(201, body))
            }
            _ => Ok(json_response(404, json!({}))),
        }
    }
}

fn cfg() -> RunConfig {
    RunConfig {
        base_url: "http://posts.test".to_string(),
        auth: None,
        timeout: Duration::from_secs(5),
    }
}

fn no_headers() -> IndexMap<String, String> {
    IndexMap::new()
}

fn get_post_scenario(predicates: Vec<(FieldPath, Predicate)>) -> Scenario {
    Scenario {
        id: "Get post by id: id=1".to_string(),
        request: RequestDescriptor {
            method: Method::Get,
            url: "/posts/1".to_string(),
            headers: no_headers(),
            body: None,
        },
        expect: Expectation {
            status: StatusRule::One(200),
            content_type: Some("application/json".to_string()),
            headers: Vec::new(),
            predicates,
        },
    }
}

#[tokio::test]
async fn get_post_contract_passes() {
    let scenario = get_post_scenario(vec![
        (FieldPath::parse("id"), Predicate::Equals(json!(1))),
        (FieldPath::parse("title"), Predicate::Equals(json!(TITLE))),
        (FieldPath::parse("body"), Predicate::NotNull),
        (FieldPath::parse("userId"), Predicate::GreaterThan(0.0)),
    ]);
    let summary = run_scenarios(&PostsService, &cfg(), &[scenario]).await;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 0);
    let text = render_human(&summary, false, false, false);
    assert!(text.contains("[OK]"));
}

#[tokio::test]
async fn wrong_id_yields_exactly_one_mismatch() {
    let scenario = get_post_scenario(vec![(
        FieldPath::parse("id"),
        Predicate::Equals(json!(2)),
    )]);
    let summary = run_scenarios(&PostsService, &cfg(), &[scenario]).await;
    assert_eq!(summary.failed, 1);
    let case = &summary.cases[0];
    assert_eq!(case.verdict.mismatches.len(), 1);
    assert_eq!(case.verdict.mismatches[0].expected, "2");
    assert_eq!(case.verdict.mismatches[0].actual, "1");
    assert!(!case.errored());
    let text = render_human(&summary, false, false, false);
    assert!(text.contains("[FAIL]"));
}

#[tokio::test]
async fn created_post_echoes_a_positive_id() {
    let scenario = Scenario {
        id: "Create post".to_string(),
        request: RequestDescriptor {
            method: Method::Post,
            url: "/posts".to_string(),
            headers: no_headers(),
            body: Some(json!({"title": "test title", "body": "test body", "userId": 1})),
        },
        expect: Expectation {
            status: StatusRule::One(201),
            content_type: None,
            headers: Vec::new(),
            predicates: vec![
                (FieldPath::parse("id"), Predicate::NotNull),
                (FieldPath::parse("id"), Predicate::GreaterThan(0.0)),
                (
                    FieldPath::parse("title"),
                    Predicate::Equals(json!("test title")),
                ),
            ],
        },
    };
    let summary = run_scenarios(&PostsService, &cfg(), &[scenario]).await;
    assert_eq!(summary.passed, 1);
}

#[tokio::test]
async fn failed_scenarios_capture_diagnostics() {
    let scenario = get_post_scenario(vec![(
        FieldPath::parse("id"),
        Predicate::Equals(json!(2)),
    )]);
    let summary = run_scenarios(&PostsService, &cfg(), &[scenario]).await;
    let diagnostics = summary.cases[0]
        .diagnostics
        .as_deref()
        .expect("failure keeps a rendered trace");
    assert!(diagnostics.contains("content-type"));
    assert!(diagnostics.contains("\"id\": 1"));
    // Passing runs keep no trace
    let passing = get_post_scenario(vec![(FieldPath::parse("id"), Predicate::Equals(json!(1)))]);
    let summary = run_scenarios(&PostsService, &cfg(), &[passing]).await;
    assert!(summary.cases[0].diagnostics.is_none());
}

#[tokio::test]
async fn check_counts_are_aggregated() {
    let scenario = get_post_scenario(vec![
        (FieldPath::parse("id"), Predicate::Equals(json!(1))),
        (FieldPath::parse("userId"), Predicate::GreaterThan(0.0)),
    ]);
    // status + content-type + 2 predicates
    let summary = run_scenarios(&PostsService, &cfg(), &[scenario]).await;
    assert_eq!(summary.total_checks, 4);
    assert_eq!(summary.passed_checks, 4);
    assert_eq!(summary.failed_checks, 0);
}
