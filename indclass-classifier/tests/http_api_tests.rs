//! HTTP surface tests driven through the router with `oneshot`

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use indclass_classifier::bootstrap::DEFAULT_SEED;
use indclass_classifier::{build_router, AppState, ClassificationResult, IndustryClassifier, ServiceConfig};
use indclass_common::seed::parse_seed;
use indclass_common::{CodeStore, CodeType, IndustryCode, MemoryCodeStore};

fn test_state(timeout: Option<Duration>) -> AppState {
    let codes = parse_seed(DEFAULT_SEED).unwrap();
    let store: Arc<dyn CodeStore> = Arc::new(MemoryCodeStore::with_codes(codes));
    let classifier = Arc::new(IndustryClassifier::new(store, &ServiceConfig::default()));
    AppState::new(classifier, timeout)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn pizza() -> Value {
    json!({
        "business_name": "Joe's Pizza Restaurant",
        "description": "family Italian restaurant serving pizza and pasta"
    })
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = build_router(test_state(None));
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "indclass-classifier");
    assert_eq!(body["strategies"].as_array().unwrap().len(), 4);
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_classify_pizza_restaurant() {
    let app = build_router(test_state(None));
    let (status, body) = send(&app, post_json("/classify", &pizza())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["results"].as_array().unwrap().is_empty());
    assert_eq!(body["metadata"]["strategy"], "enhanced-aggregation");
    assert_eq!(body["business_name"], "Joe's Pizza Restaurant");
    for key in ["sic", "naics", "mcc"] {
        assert!(body["by_type"][key].is_array(), "missing by_type.{}", key);
    }
}

#[tokio::test]
async fn test_classify_empty_request_is_bad_request() {
    let app = build_router(test_state(None));
    let (status, body) = send(&app, post_json("/classify", &json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // Caller mistakes do not degrade health
    let (_, health) = send(&app, get("/health")).await;
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_aggregate_summary_view() {
    let app = build_router(test_state(None));
    let result = ClassificationResult::new(
        IndustryCode::new("sic-5812", "5812", CodeType::Sic, "Eating Places")
            .with_category("Restaurant and Food Service"),
        0.8,
        "keyword",
        0.9,
    )
    .with_matched_on("pizza")
    .with_reason("keyword 'pizza' matched");
    let request = json!({
        "results": [serde_json::to_value(&result).unwrap()],
        "presentation": "summary"
    });

    let (status, body) = send(&app, post_json("/aggregate", &request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_input_results"], 1);
    assert_eq!(body["presentation"]["format"], "summary");
    assert_eq!(body["presentation"]["view"]["total_results"], 1);
}

#[tokio::test]
async fn test_aggregate_rejects_out_of_range_confidence() {
    let app = build_router(test_state(None));
    let request = json!({ "results": [], "min_confidence": 1.5 });
    let (status, body) = send(&app, post_json("/aggregate", &request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_code_stats_match_seed() {
    let app = build_router(test_state(None));
    let seeded = parse_seed(DEFAULT_SEED).unwrap().len();
    let (status, body) = send(&app, get("/codes/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_codes"], seeded as u64);
}

#[tokio::test]
async fn test_expired_deadline_returns_gateway_timeout() {
    let app = build_router(test_state(Some(Duration::ZERO)));
    let (status, body) = send(&app, post_json("/classify", &pizza())).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"]["code"].is_string());

    let (_, health) = send(&app, get("/health")).await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].is_string());
}

#[tokio::test]
async fn test_strategy_performance_after_classify() {
    let app = build_router(test_state(None));
    let (status, _) = send(&app, post_json("/classify", &pizza())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/strategies/performance")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["strategies"].get("keyword").is_some());

    let (status, body) = send(&app, post_json("/strategies/performance/reset", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["strategies"].as_object().unwrap().is_empty());

    let (_, body) = send(&app, get("/strategies/performance")).await;
    assert!(body["strategies"].get("keyword").is_none());
}
