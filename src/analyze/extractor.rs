// src/analyze/extractor.rs
//! Prompt → reply → `AnalysisRecord`. Never fails outward: every failure
//! path ends in the complete default record.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::analyze::ai_adapter::{BackendChain, GenerationRequest};
use crate::analyze::record::{AnalysisRecord, RECORD_KEYS};
use crate::config::GenerationParams;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::locator_tag;
use crate::ingest::types::ExtractedContent;

/// Build the fixed instruction prompt. Article text is capped at
/// `content_chars` characters; without text the title and short description
/// stand in for it.
pub fn build_extraction_prompt(content: &ExtractedContent, content_chars: usize) -> String {
    let item = &content.source_item;
    let keys = RECORD_KEYS.join(", ");
    let mut p = String::with_capacity(1_024 + content_chars);
    p.push_str(
        "Analyze the following business news article and respond with ONLY a JSON object \
         containing exactly these keys: ",
    );
    p.push_str(&keys);
    p.push_str(
        ".\nOverall_Sentiment must be Positive, Negative or Neutral. \
         Polarity_Score must be a number between -1 and 1. \
         Search_Volume must be High, Medium or Low. \
         Sector should be one of Tech, Finance, Healthcare, Energy or General. \
         All other values are short plain-text phrases.\n\n",
    );
    p.push_str("Title: ");
    p.push_str(&item.title);
    p.push('\n');

    let text = content.text.trim();
    if text.is_empty() {
        if !item.short_description.trim().is_empty() {
            p.push_str("Summary: ");
            p.push_str(item.short_description.trim());
            p.push('\n');
        }
    } else {
        let excerpt: String = text.chars().take(content_chars).collect();
        p.push_str("Article:\n");
        p.push_str(&excerpt);
        p.push('\n');
    }
    p
}

/// Locate the JSON object in a free-form reply: the first fenced block if
/// there is one, else the first balanced `{...}` span.
pub fn locate_json(reply: &str) -> Option<&str> {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap());
    if let Some(c) = re.captures(reply) {
        if let Some(m) = c.get(1) {
            let inner = m.as_str().trim();
            if let Some(span) = balanced_object(inner) {
                return Some(span);
            }
        }
    }
    balanced_object(reply)
}

/// First top-level `{...}` span, skipping braces inside string literals.
fn balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, ch) in s[start..].char_indices() {
        if in_str {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a raw reply into a record, or say why it cannot be done.
pub fn parse_reply(reply: &str) -> PipelineResult<AnalysisRecord> {
    let span = locate_json(reply)
        .ok_or_else(|| PipelineError::ExtractionMalformed("no JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(span)
        .map_err(|e| PipelineError::ExtractionMalformed(format!("invalid JSON: {e}")))?;
    AnalysisRecord::from_json_value(&value)
}

pub struct StructuredExtractor {
    chain: BackendChain,
    params: GenerationParams,
    content_chars: usize,
}

impl StructuredExtractor {
    pub fn new(chain: BackendChain, params: GenerationParams, content_chars: usize) -> Self {
        Self {
            chain,
            params,
            content_chars: content_chars.max(1),
        }
    }

    /// Like `extract` but reports the failure instead of substituting.
    pub async fn try_extract(&self, content: &ExtractedContent) -> PipelineResult<AnalysisRecord> {
        let req = GenerationRequest {
            prompt: build_extraction_prompt(content, self.content_chars),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
        };
        let (reply, backend) = self
            .chain
            .generate(&req)
            .await
            .map_err(|e| PipelineError::ExtractionUnavailable(e.to_string()))?;
        tracing::debug!(target: "extract", backend, reply_chars = reply.len(), "reply received");
        parse_reply(&reply)
    }

    /// Always a complete record.
    pub async fn extract(&self, content: &ExtractedContent) -> AnalysisRecord {
        match self.try_extract(content).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    target: "extract",
                    item = %locator_tag(&content.source_item.locator),
                    fetch_failed = content.fetch_failed,
                    error = %e,
                    "extraction defaulted"
                );
                counter!("pipeline_extraction_defaults_total").increment(1);
                AnalysisRecord::default()
            }
        }
    }
}
