use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::coordinator::{RunCoordinator, RunError};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
    /// Present when the process installed a Prometheus recorder.
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: AppState) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/trends", get(trends_get).post(trends_post))
        .route("/api/trends/latest", get(trends_latest));

    if let Some(handle) = state.metrics.clone() {
        r = r.route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        );
    }

    r.layer(CorsLayer::very_permissive()).with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct TopicParams {
    #[serde(default)]
    topic: Option<String>,
}

async fn trends_get(State(state): State<AppState>, Query(q): Query<TopicParams>) -> Response {
    run_topic(&state, q.topic).await
}

/// Topic from the JSON body, falling back to the query string.
async fn trends_post(
    State(state): State<AppState>,
    Query(q): Query<TopicParams>,
    body: Bytes,
) -> Response {
    let from_body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<TopicParams>(&body) {
            Ok(p) => p.topic,
            Err(_) => return error(StatusCode::BAD_REQUEST, "Request body must be JSON"),
        }
    };
    run_topic(&state, from_body.or(q.topic)).await
}

async fn trends_latest(State(state): State<AppState>) -> Response {
    Json(state.coordinator.latest().as_deref()).into_response()
}

async fn run_topic(state: &AppState, topic: Option<String>) -> Response {
    let topic = topic.unwrap_or_default();
    if topic.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Topic is required");
    }
    match state.coordinator.submit(topic.trim()).await {
        Ok(run) => Json(run.as_ref()).into_response(),
        Err(e @ RunError::Superseded(_)) => error(StatusCode::CONFLICT, &e.to_string()),
        Err(e @ RunError::Failed(..)) => error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}
