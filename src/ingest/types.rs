// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// One candidate article as listed by the search provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceItem {
    pub title: String,
    pub locator: String, // article URL
    pub short_description: String,
}

/// Text fetched for one item. Empty text with `fetch_failed` is a valid value
/// and tells the extractor to work from the title and description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedContent {
    pub source_item: SourceItem,
    pub text: String,
    pub fetch_failed: bool,
}

impl ExtractedContent {
    pub fn fetched(source_item: SourceItem, text: String) -> Self {
        Self {
            source_item,
            text,
            fetch_failed: false,
        }
    }

    pub fn failed(source_item: SourceItem) -> Self {
        Self {
            source_item,
            text: String::new(),
            fetch_failed: true,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Items in provider relevance order, at most `limit`.
    async fn search(&self, topic: &str, limit: usize) -> PipelineResult<Vec<SourceItem>>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_text(&self, locator: &str) -> PipelineResult<String>;
    fn name(&self) -> &'static str;
}
