// src/market.rs
//! Market time series (closing prices) and the derived percent-change series.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{MarketParams, ProviderEndpoint};
use crate::error::{http_client, PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSeriesPoint {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentChangePoint {
    pub date: String,
    pub close: f64,
    pub percent_change: f64,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Points in ascending date order.
    async fn series(&self, params: &MarketParams) -> PipelineResult<Vec<MarketSeriesPoint>>;
    fn name(&self) -> &'static str;
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `(c_i - c_{i-1}) / c_{i-1} * 100`, rounded to 2 decimals. The first
/// point, and any point after a zero close, has change 0.
pub fn percent_change_series(points: &[MarketSeriesPoint]) -> Vec<PercentChangePoint> {
    let mut out = Vec::with_capacity(points.len());
    let mut prev: Option<f64> = None;
    for p in points {
        let change = match prev {
            Some(c0) if c0 != 0.0 => round2((p.close - c0) / c0 * 100.0),
            _ => 0.0,
        };
        out.push(PercentChangePoint {
            date: p.date.clone(),
            close: round2(p.close),
            percent_change: change,
        });
        prev = Some(p.close);
    }
    out
}

/// Twelve Data `time_series`.
pub struct TwelveDataProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    values: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    datetime: String,
    close: serde_json::Value,
}

impl TwelveDataProvider {
    pub fn new(endpoint: &ProviderEndpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            timeout,
        }
    }

    /// Parse a `time_series` body. Closes arrive as strings; points are
    /// returned oldest first.
    pub fn parse_series(body: &str) -> PipelineResult<Vec<MarketSeriesPoint>> {
        let ts: TimeSeries = serde_json::from_str(body)
            .map_err(|e| PipelineError::MarketUnavailable(format!("bad reply: {e}")))?;
        if ts.status.as_deref() == Some("error") {
            return Err(PipelineError::MarketUnavailable(
                ts.message.unwrap_or_else(|| "provider error".to_string()),
            ));
        }
        let mut points: Vec<MarketSeriesPoint> = ts
            .values
            .into_iter()
            .filter_map(|p| {
                let close = match &p.close {
                    serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                    serde_json::Value::Number(n) => n.as_f64(),
                    _ => None,
                }?;
                close.is_finite().then_some(MarketSeriesPoint {
                    date: p.datetime,
                    close,
                })
            })
            .collect();
        points.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(points)
    }
}

#[async_trait]
impl MarketDataProvider for TwelveDataProvider {
    async fn series(&self, params: &MarketParams) -> PipelineResult<Vec<MarketSeriesPoint>> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Unconfigured("TWELVE_DATA_API_KEY"));
        }
        let output_size = params.output_size.to_string();
        let resp = self
            .http
            .get(format!("{}/time_series", self.base_url))
            .query(&[
                ("symbol", params.symbol.as_str()),
                ("interval", params.interval.as_str()),
                ("outputsize", output_size.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;
        Self::parse_series(&body)
    }

    fn name(&self) -> &'static str {
        "twelvedata"
    }
}
