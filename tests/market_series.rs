// tests/market_series.rs
mod common;

use axum::{extract::Query, routing::get, Json, Router};
use common::{closes, serve};
use evolvex_trends::config::{MarketParams, ProviderEndpoint};
use evolvex_trends::error::PipelineError;
use evolvex_trends::market::{percent_change_series, MarketDataProvider, TwelveDataProvider};
use serde_json::json;
use std::collections::HashMap;

#[test]
fn percent_change_matches_reference_values() {
    let s = percent_change_series(&closes(&[100.0, 101.0, 99.0]));
    let ch: Vec<f64> = s.iter().map(|p| p.percent_change).collect();
    assert_eq!(ch, vec![0.0, 1.0, -1.98]);
    assert_eq!(s[2].close, 99.0);
    assert_eq!(s[0].date, "2024-01-01");
}

fn endpoint(base: &str, key: &str) -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: base.to_string(),
        api_key: key.to_string(),
        model: None,
        timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn twelve_data_request_and_ordering() {
    let router = Router::new().route(
        "/time_series",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            if q.get("apikey").map(String::as_str) != Some("k")
                || q.get("symbol").map(String::as_str) != Some("SPY")
                || q.get("outputsize").map(String::as_str) != Some("3")
            {
                return Json(json!({"status": "error", "message": "bad request"}));
            }
            Json(json!({
                "meta": {"symbol": "SPY"},
                "status": "ok",
                "values": [
                    {"datetime": "2024-01-03", "close": "99.00000"},
                    {"datetime": "2024-01-02", "close": "101.00000"},
                    {"datetime": "2024-01-01", "close": "100.00000"}
                ]
            }))
        }),
    );
    let base = serve(router).await;

    let p = TwelveDataProvider::new(&endpoint(&base, "k"));
    let params = MarketParams {
        output_size: 3,
        ..Default::default()
    };
    let points = p.series(&params).await.expect("series");
    let ch: Vec<f64> = percent_change_series(&points)
        .iter()
        .map(|x| x.percent_change)
        .collect();
    assert_eq!(ch, vec![0.0, 1.0, -1.98]);
}

#[tokio::test]
async fn missing_key_is_unconfigured() {
    let p = TwelveDataProvider::new(&endpoint("http://127.0.0.1:9", ""));
    let err = p.series(&MarketParams::default()).await.unwrap_err();
    assert_eq!(err, PipelineError::Unconfigured("TWELVE_DATA_API_KEY"));
}
