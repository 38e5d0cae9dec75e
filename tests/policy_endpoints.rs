mod common;

use axum::body::{to_bytes, Body};
use common::{seed_policy, seeded_state, test_config};
use http::Request;
use prompt_gateway::app::{build_router, AppState};
use prompt_gateway::module::analyze::schema::HealthResponse;
use prompt_gateway::module::policy::model::{PatternKind, PolicyAction, Severity};
use prompt_gateway::module::policy::schema::{
    CreatePolicyRequest, CreatePolicyResponse, GetPolicyResponse, ListPoliciesResponse,
};
use serde::de::DeserializeOwned;
use tower::util::ServiceExt;

async fn send<T: DeserializeOwned>(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Vec<u8>>,
) -> (http::StatusCode, T) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(bytes) => {
            builder = builder.header("content-type", "application/json");
            Body::from(bytes)
        }
        None => Body::empty(),
    };
    let response = app
        .oneshot(builder.body(body).expect("build request"))
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("decode response"))
}

fn create_request(pattern_type: &str, pattern_value: &str) -> CreatePolicyRequest {
    CreatePolicyRequest {
        name: "test-policy".to_string(),
        description: None,
        pattern_type: pattern_type.to_string(),
        pattern_value: pattern_value.to_string(),
        severity: "high".to_string(),
        action: "block".to_string(),
    }
}

async fn post_create(
    app: axum::Router,
    req: &CreatePolicyRequest,
) -> (http::StatusCode, CreatePolicyResponse) {
    send(
        app,
        "POST",
        "/v1/policies",
        Some(serde_json::to_vec(req).expect("encode request")),
    )
    .await
}

#[tokio::test]
async fn create_rejects_invalid_regex() {
    let state = seeded_state(Vec::new());
    let app = build_router(state.clone());

    let (status, body) = post_create(app, &create_request("regex", "[unbalanced(")).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert!(!body.created);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_REGEX_PATTERN"));
    // Cache untouched by the rejected create.
    assert_eq!(state.cache.get().policies.len(), 0);
}

#[tokio::test]
async fn create_rejects_unknown_pattern_type() {
    let app = build_router(seeded_state(Vec::new()));
    let (status, body) = post_create(app, &create_request("soundex", "whatever")).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_PATTERN_TYPE"));
}

#[tokio::test]
async fn create_rejects_unknown_severity() {
    let mut req = create_request("keyword", "DAN");
    req.severity = "catastrophic".to_string();
    let app = build_router(seeded_state(Vec::new()));
    let (status, body) = post_create(app, &req).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_SEVERITY"));
}

#[tokio::test]
async fn create_rejects_unknown_action() {
    let mut req = create_request("keyword", "DAN");
    req.action = "quarantine".to_string();
    let app = build_router(seeded_state(Vec::new()));
    let (status, body) = post_create(app, &req).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_ACTION"));
}

#[tokio::test]
async fn create_rejects_empty_name() {
    let mut req = create_request("keyword", "DAN");
    req.name = "  ".to_string();
    let app = build_router(seeded_state(Vec::new()));
    let (status, body) = post_create(app, &req).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_NAME"));
}

#[tokio::test]
async fn create_without_store_is_unavailable() {
    let app = build_router(seeded_state(Vec::new()));
    let (status, body) = post_create(app, &create_request("keyword", "DAN")).await;

    assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.error_code.as_deref(), Some("STORE_UNAVAILABLE"));
}

#[tokio::test]
async fn list_returns_cached_policies() {
    let state = seeded_state(vec![
        seed_policy("a", PatternKind::Keyword, "alpha", Severity::Low, PolicyAction::Log),
        seed_policy("b", PatternKind::Keyword, "beta", Severity::High, PolicyAction::Block),
    ]);
    let app = build_router(state);

    let (status, body): (_, ListPoliciesResponse) = send(app, "GET", "/v1/policies", None).await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body.count, 2);
    assert_eq!(body.policies.len(), 2);
}

#[tokio::test]
async fn get_policy_served_from_cache() {
    let policy = seed_policy("a", PatternKind::Keyword, "alpha", Severity::Low, PolicyAction::Log);
    let id = policy.id;
    let app = build_router(seeded_state(vec![policy]));

    let uri = format!("/v1/policies/{id}");
    let (status, body): (_, GetPolicyResponse) = send(app, "GET", &uri, None).await;

    assert_eq!(status, http::StatusCode::OK);
    assert!(body.found);
    assert_eq!(body.policy.expect("policy in body").id, id);
}

#[tokio::test]
async fn get_unknown_policy_is_not_found() {
    let app = build_router(seeded_state(Vec::new()));

    let uri = format!("/v1/policies/{}", uuid::Uuid::new_v4());
    let (status, body): (_, GetPolicyResponse) = send(app, "GET", &uri, None).await;

    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert!(!body.found);
    assert_eq!(body.error_code.as_deref(), Some("POLICY_NOT_FOUND"));
}

#[tokio::test]
async fn get_policy_rejects_bad_id() {
    let app = build_router(seeded_state(Vec::new()));

    let (status, body): (_, GetPolicyResponse) =
        send(app, "GET", "/v1/policies/not-a-uuid", None).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body.error_code.as_deref(), Some("INVALID_POLICY_ID"));
}

#[tokio::test]
async fn health_reports_degraded_without_infra() {
    let state = AppState::new(test_config(), None).expect("state init");
    state.cache.publish(vec![seed_policy(
        "a",
        PatternKind::Keyword,
        "alpha",
        Severity::Low,
        PolicyAction::Log,
    )]);
    let app = build_router(state);

    let (status, body): (_, HealthResponse) = send(app, "GET", "/v1/health", None).await;

    assert_eq!(status, http::StatusCode::OK);
    assert!(!body.ok);
    assert!(!body.postgres_available);
    assert!(!body.redis_available);
    assert_eq!(body.policies_cached, 1);
    assert_eq!(body.snapshot_version, 1);
    assert!(!body.queue.available);
}
