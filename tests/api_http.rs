// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/trends?topic=...
// - POST /api/trends with JSON body
// - 400 on missing/blank topic
// - GET /api/trends/latest before and after a run

mod common;

use common::{item, stub_collaborators, test_config, StaticSearch};
use serde_json::json;
use serde_json::Value as Json;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use evolvex_trends::api::{self, AppState};
use evolvex_trends::coordinator::RunCoordinator;
use evolvex_trends::pipeline::Pipeline;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Router over stub collaborators; no metrics recorder.
fn test_router() -> Router {
    let search = Arc::new(StaticSearch::ok(vec![item(1), item(2), item(3)]));
    let pipeline = Arc::new(Pipeline::new(test_config(), stub_collaborators(search)));
    api::router(AppState {
        coordinator: Arc::new(RunCoordinator::new(pipeline)),
        metrics: None,
    })
}

async fn read_json(resp: Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn api_get_trends_returns_run_contract() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/api/trends?topic=cloud%20computing")
        .body(Body::empty())
        .expect("build GET /api/trends");

    let resp = app.oneshot(req).await.expect("oneshot /api/trends");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;

    // Contract checks for UI consumers
    assert_eq!(v["topic"], "cloud computing");
    assert_eq!(v["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(v["records"].as_array().map(Vec::len), Some(3));
    assert!(v["records"][0].get("Overall_Sentiment").is_some());
    assert!(v["records"][0].get("Employment_Opportunity").is_some());
    assert!(v["saturation"].get("Tech").is_some());
    let p = &v["presentation"];
    for key in [
        "sentiment_histogram",
        "polarity_series",
        "saturation_series",
        "market_change",
        "narratives",
    ] {
        assert!(p.get(key).is_some(), "presentation missing '{key}'");
    }
    assert!(v["banner"].is_null());
    let csv = v["csv"].as_str().expect("csv export is a string");
    assert!(csv.starts_with("Overall_Sentiment,Emotion_Detection,"));
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn api_post_trends_reads_json_body() {
    let app = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/api/trends")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "topic": "fintech" }).to_string()))
        .expect("build POST /api/trends");

    let resp = app.oneshot(req).await.expect("oneshot POST /api/trends");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["topic"], "fintech");
}

#[tokio::test]
async fn api_blank_topic_is_400() {
    for uri in ["/api/trends", "/api/trends?topic=%20%20"] {
        let resp = test_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(read_json(resp).await["error"], "Topic is required");
    }

    let resp = test_router()
        .oneshot(
            Request::post("/api/trends")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"topic": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_latest_is_null_then_last_run() {
    let app = test_router();

    let resp = app
        .clone()
        .oneshot(Request::get("/api/trends/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(read_json(resp).await.is_null());

    let resp = app
        .clone()
        .oneshot(Request::get("/api/trends?topic=biotech").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/api/trends/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let v = read_json(resp).await;
    assert_eq!(v["topic"], "biotech");
    assert_eq!(v["run_id"], 1);
}

#[tokio::test]
async fn api_metrics_route_absent_without_recorder() {
    let resp = test_router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
