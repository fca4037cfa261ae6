// src/ingest/providers/newsapi.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ProviderEndpoint;
use crate::error::{http_client, PipelineError, PipelineResult};
use crate::ingest::normalize_text;
use crate::ingest::types::{SearchProvider, SourceItem};

/// NewsAPI marks takedowns with this literal title/url.
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
}

/// `GET /v2/everything` search provider.
pub struct NewsApiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    timeout: Duration,
}

impl NewsApiProvider {
    pub fn new(endpoint: &ProviderEndpoint, language: &str) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            language: language.to_string(),
            timeout,
        }
    }

    /// Parse an `everything` reply body into items. Public for fixtures/tests.
    pub fn parse_items(body: &str, limit: usize) -> PipelineResult<Vec<SourceItem>> {
        let t0 = std::time::Instant::now();
        let env: Envelope = serde_json::from_str(body)
            .map_err(|e| PipelineError::SourceUnavailable(format!("bad search reply: {e}")))?;

        if env.status.as_deref() != Some("ok") {
            return Err(PipelineError::SourceUnavailable(
                env.message.unwrap_or_else(|| "search provider error".to_string()),
            ));
        }

        let mut out = Vec::with_capacity(limit.min(env.articles.len()));
        for a in env.articles {
            if out.len() >= limit {
                break;
            }
            let title = normalize_text(a.title.as_deref().unwrap_or_default(), 300);
            let url = a.url.unwrap_or_default().trim().to_string();
            if title.is_empty() || url.is_empty() || title == REMOVED_MARKER {
                continue;
            }
            out.push(SourceItem {
                title,
                locator: url,
                short_description: normalize_text(
                    a.description.as_deref().unwrap_or_default(),
                    1_500,
                ),
            });
        }

        histogram!("pipeline_search_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if out.is_empty() {
            return Err(PipelineError::SourceUnavailable(
                "search returned no usable articles".to_string(),
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl SearchProvider for NewsApiProvider {
    async fn search(&self, topic: &str, limit: usize) -> PipelineResult<Vec<SourceItem>> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Unconfigured("NEWS_API_KEY"));
        }
        let url = format!("{}/v2/everything", self.base_url);
        let page_size = limit.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", topic),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                counter!("pipeline_provider_errors_total", "provider" => "newsapi").increment(1);
                PipelineError::from_reqwest(e, self.timeout)
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;
        Self::parse_items(&body, limit)
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
