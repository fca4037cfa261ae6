// src/ingest/mod.rs
//! Source listing and content fetching.
pub mod cache;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::error::PipelineError;
use crate::ingest::cache::SourceCache;
use crate::ingest::types::{ContentProvider, ExtractedContent, SearchProvider, SourceItem};
use crate::retry::RetryPolicy;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Locator used by placeholder items.
pub const PLACEHOLDER_LOCATOR: &str = "about:blank";

/// Upper bound on fetched text kept per item.
const MAX_FETCHED_CHARS: usize = 20_000;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_fetch_failures_total",
            "Content fetches that ended with empty text."
        );
        describe_counter!(
            "pipeline_source_fallbacks_total",
            "Runs that used cached or placeholder sources."
        );
        describe_counter!(
            "pipeline_provider_errors_total",
            "Provider transport/status errors by provider."
        );
        describe_histogram!("pipeline_fetch_ms", "Content fetch time in milliseconds.");
        describe_histogram!(
            "pipeline_search_parse_ms",
            "Search reply parse time in milliseconds."
        );
    });
}

/// Decode entities, strip tags, unify quotes, collapse whitespace and cap at
/// `max_chars` characters.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Short anonymized tag for logs; article URLs and text are never logged raw.
pub fn locator_tag(locator: &str) -> String {
    let digest = Sha256::digest(locator.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// Single placeholder item standing in for a failed listing.
pub fn placeholder_items(topic: &str) -> Vec<SourceItem> {
    let topic = topic.trim();
    vec![SourceItem {
        title: topic.to_string(),
        locator: PLACEHOLDER_LOCATOR.to_string(),
        short_description: format!("No live articles were available for {topic}."),
    }]
}

/// Outcome of the listing stage after substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<SourceItem>,
    /// Set when live search failed and cached/placeholder items were used.
    pub fallback: Option<ListingFallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFallback {
    Cached,
    Placeholder,
}

/// Call the search provider under the retry policy. Any failure is reported
/// as `SourceUnavailable`.
pub async fn list_sources(
    provider: &dyn SearchProvider,
    topic: &str,
    max_items: usize,
    retry: &RetryPolicy,
) -> Result<Vec<SourceItem>, PipelineError> {
    let topic = topic.trim();
    let res = retry
        .run_transient("search", |_| provider.search(topic, max_items))
        .await;
    match res {
        Ok(mut items) => {
            items.truncate(max_items);
            Ok(items)
        }
        Err(e @ PipelineError::SourceUnavailable(_)) => Err(e),
        Err(e) => Err(PipelineError::SourceUnavailable(e.to_string())),
    }
}

/// `list_sources` with cache write-through and cached/placeholder substitution.
pub async fn list_sources_or_fallback(
    provider: &dyn SearchProvider,
    cache: &dyn SourceCache,
    topic: &str,
    max_items: usize,
    retry: &RetryPolicy,
) -> Listing {
    ensure_metrics_described();
    match list_sources(provider, topic, max_items, retry).await {
        Ok(items) => {
            cache.set(topic, &items);
            Listing {
                items,
                fallback: None,
            }
        }
        Err(e) => {
            counter!("pipeline_source_fallbacks_total").increment(1);
            match cache.get(topic) {
                Some(mut cached) if !cached.is_empty() => {
                    tracing::warn!(
                        target: "ingest",
                        provider = provider.name(),
                        error = %e,
                        cached = cached.len(),
                        "search failed, serving cached sources"
                    );
                    cached.truncate(max_items);
                    Listing {
                        items: cached,
                        fallback: Some(ListingFallback::Cached),
                    }
                }
                _ => {
                    tracing::warn!(
                        target: "ingest",
                        provider = provider.name(),
                        error = %e,
                        "search failed, serving placeholder sources"
                    );
                    Listing {
                        items: placeholder_items(topic),
                        fallback: Some(ListingFallback::Placeholder),
                    }
                }
            }
        }
    }
}

/// Fetch text for one item. Never fails: a timeout, exhausted retries or an
/// empty body all come back as `ExtractedContent::failed`.
pub async fn fetch_content(
    provider: &dyn ContentProvider,
    item: SourceItem,
    timeout: Duration,
    retry: &RetryPolicy,
) -> ExtractedContent {
    ensure_metrics_described();
    if item.locator == PLACEHOLDER_LOCATOR {
        return ExtractedContent::failed(item);
    }

    let t0 = Instant::now();
    let locator = item.locator.as_str();
    let res = retry
        .run_transient("fetch", |_| async move {
            match tokio::time::timeout(timeout, provider.fetch_text(locator)).await {
                Ok(Ok(body)) => {
                    let text = normalize_text(&body, MAX_FETCHED_CHARS);
                    if text.is_empty() {
                        Err(PipelineError::FetchFailed("empty body".to_string()))
                    } else {
                        Ok(text)
                    }
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(PipelineError::FetchTimeout(timeout)),
            }
        })
        .await;
    histogram!("pipeline_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(text) => {
            tracing::debug!(
                target: "ingest",
                item = %locator_tag(&item.locator),
                chars = text.chars().count(),
                "content fetched"
            );
            ExtractedContent::fetched(item, text)
        }
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                provider = provider.name(),
                item = %locator_tag(&item.locator),
                error = %e,
                "content fetch failed"
            );
            counter!("pipeline_fetch_failures_total").increment(1);
            ExtractedContent::failed(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>!  \n\n 5 < 6 ";
        assert_eq!(normalize_text(s, 100), "Hello, world! 5 < 6");
    }

    #[test]
    fn normalize_text_caps_by_chars() {
        assert_eq!(normalize_text("ééééé", 3), "ééé");
    }

    #[test]
    fn placeholder_names_the_topic() {
        let items = placeholder_items("  solar panels ");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "solar panels");
        assert_eq!(items[0].locator, PLACEHOLDER_LOCATOR);
        assert_eq!(
            items[0].short_description,
            "No live articles were available for solar panels."
        );
    }

    #[test]
    fn locator_tag_is_stable_and_short() {
        let a = locator_tag("https://example.com/a");
        assert_eq!(a.len(), 12);
        assert_eq!(a, locator_tag("https://example.com/a"));
        assert_ne!(a, locator_tag("https://example.com/b"));
    }
}
