// src/ingest/providers/jina_reader.rs
use async_trait::async_trait;
use metrics::counter;
use std::time::Duration;

use crate::config::ProviderEndpoint;
use crate::error::{http_client, PipelineError, PipelineResult};
use crate::ingest::types::ContentProvider;

/// Reader service that renders an article URL as plain text:
/// `GET {base}/{url}`.
pub struct JinaReaderProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl JinaReaderProvider {
    pub fn new(endpoint: &ProviderEndpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            timeout,
        }
    }

    fn reader_url(&self, locator: &str) -> String {
        format!("{}/{}", self.base_url, locator.trim())
    }
}

#[async_trait]
impl ContentProvider for JinaReaderProvider {
    async fn fetch_text(&self, locator: &str) -> PipelineResult<String> {
        let mut req = self
            .http
            .get(self.reader_url(locator))
            .header(reqwest::header::ACCEPT, "text/plain");
        // Keyless access works at a lower rate limit.
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.map_err(|e| {
            counter!("pipeline_provider_errors_total", "provider" => "jina").increment(1);
            PipelineError::from_reqwest(e, self.timeout)
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))
    }

    fn name(&self) -> &'static str {
        "jina"
    }
}
