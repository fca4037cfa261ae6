// src/present/imagery.rs
//! Cover image per narrative: image search first, then static fallbacks.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::record::{AnalysisRecord, Sentiment};
use crate::analyze::saturation::{canonical_sector, SECTORS};
use crate::config::ProviderEndpoint;
use crate::error::{http_client, PipelineError, PipelineResult};

pub const PLACEHOLDER_IMAGE: &str = "https://picsum.photos/512";

#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    async fn search_image(&self, query: &str) -> PipelineResult<String>;
    fn name(&self) -> &'static str;
}

/// First three words of the title.
pub fn image_query(title: &str) -> String {
    title.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// Static image for a known sector, else for a non-neutral sentiment.
pub fn static_image_for(r: &AnalysisRecord) -> Option<String> {
    let sector = canonical_sector(&r.sector);
    if SECTORS.contains(&sector.as_str()) {
        return Some(format!(
            "https://picsum.photos/seed/evolvex-{}/512",
            sector.to_ascii_lowercase()
        ));
    }
    match r.sentiment {
        Sentiment::Positive => Some("https://picsum.photos/seed/evolvex-positive/512".to_string()),
        Sentiment::Negative => Some("https://picsum.photos/seed/evolvex-negative/512".to_string()),
        Sentiment::Neutral => None,
    }
}

/// Unsplash `search/photos`.
pub struct UnsplashProvider {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SearchResp {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
}

impl UnsplashProvider {
    pub fn new(endpoint: &ProviderEndpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            access_key: endpoint.api_key.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl ImageSearchProvider for UnsplashProvider {
    async fn search_image(&self, query: &str) -> PipelineResult<String> {
        if self.access_key.is_empty() {
            return Err(PipelineError::Unconfigured("UNSPLASH_API_KEY"));
        }
        let resp = self
            .http
            .get(format!("{}/search/photos", self.base_url))
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("client_id", self.access_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        let body: SearchResp = resp
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(e.to_string()))?;
        body.results
            .into_iter()
            .next()
            .and_then(|p| p.urls.regular)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PipelineError::ImageUnavailable(format!("no results for {query:?}")))
    }

    fn name(&self) -> &'static str {
        "unsplash"
    }
}

#[derive(Clone, Default)]
pub struct ImageResolver {
    provider: Option<Arc<dyn ImageSearchProvider>>,
}

impl ImageResolver {
    pub fn new(provider: Option<Arc<dyn ImageSearchProvider>>) -> Self {
        Self { provider }
    }

    pub async fn resolve(&self, title: &str, r: &AnalysisRecord) -> String {
        if let Some(p) = &self.provider {
            let query = image_query(title);
            if !query.is_empty() {
                match p.search_image(&query).await {
                    Ok(url) => return url,
                    Err(e) => {
                        tracing::debug!(target: "imagery", provider = p.name(), error = %e, "image search failed")
                    }
                }
            }
        }
        offline_image_for(r)
    }
}

/// Image chosen without any network call.
pub fn offline_image_for(r: &AnalysisRecord) -> String {
    static_image_for(r).unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_uses_first_three_words() {
        assert_eq!(image_query("  Oil prices  surge after cuts"), "Oil prices surge");
        assert_eq!(image_query("AI"), "AI");
    }

    #[tokio::test]
    async fn fallbacks_go_sector_then_sentiment_then_placeholder() {
        let resolver = ImageResolver::default();
        let tech = AnalysisRecord {
            sector: "tech".into(),
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve("x", &tech).await,
            "https://picsum.photos/seed/evolvex-tech/512"
        );

        let retail_pos = AnalysisRecord {
            sector: "Retail".into(),
            sentiment: Sentiment::Positive,
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve("x", &retail_pos).await,
            "https://picsum.photos/seed/evolvex-positive/512"
        );

        let retail_neutral = AnalysisRecord {
            sector: "Retail".into(),
            ..Default::default()
        };
        assert_eq!(resolver.resolve("x", &retail_neutral).await, PLACEHOLDER_IMAGE);
    }
}
