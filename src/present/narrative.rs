// src/present/narrative.rs
//! Long-form narrative per item: generated through the backend chain, with a
//! deterministic markdown template when generation is unavailable.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::analyze::ai_adapter::{BackendChain, GenerationRequest};
use crate::analyze::record::AnalysisRecord;
use crate::config::NarrativeParams;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::locator_tag;
use crate::ingest::types::SourceItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub title: String,
    pub body_markdown: String,
    pub image_url: String,
    /// False when the templated fallback was used.
    pub generated: bool,
}

pub fn build_narrative_prompt(item: &SourceItem, r: &AnalysisRecord) -> String {
    let mut p = String::with_capacity(1_024);
    p.push_str(
        "Write a well-structured blog article of 500 to 700 words in markdown about the \
         business news below. Use three sections: Introduction, Key Insights and Conclusion. \
         Weave the analysis values into the prose. Do not output JSON or code blocks.\n\n",
    );
    let _ = writeln!(p, "Title: {}", item.title);
    if !item.short_description.trim().is_empty() {
        let _ = writeln!(p, "Summary: {}", item.short_description.trim());
    }
    let _ = writeln!(p, "Overall sentiment: {} (polarity {:.2})", r.sentiment, r.polarity_score);
    let _ = writeln!(p, "Emotion: {}", r.emotion);
    let _ = writeln!(p, "Search volume: {}", r.search_volume);
    let _ = writeln!(p, "Revenue/profit impact: {}", r.revenue_impact);
    let _ = writeln!(p, "Recession signals: {}", r.recession_signal);
    let _ = writeln!(p, "Supply/demand gaps: {}", r.supply_demand_gap);
    let _ = writeln!(p, "Employment opportunity: {}", r.employment_opportunity);
    let _ = writeln!(p, "Sector: {}", r.sector);
    p
}

/// Markdown built only from the title and the record. Same input, same bytes.
pub fn fallback_narrative(title: &str, r: &AnalysisRecord) -> String {
    let mut md = String::with_capacity(1_024);
    let _ = writeln!(md, "# {}\n", title.trim());
    md.push_str("## Introduction\n\n");
    let _ = writeln!(
        md,
        "This {} sector story carries an overall {} tone (polarity {:.2}) with {} as the \
         dominant emotion, and {} search interest.\n",
        r.sector,
        r.sentiment.as_str().to_lowercase(),
        r.polarity_score,
        r.emotion.to_lowercase(),
        r.search_volume.as_str().to_lowercase(),
    );
    md.push_str("## Key Insights\n\n");
    let _ = writeln!(md, "- **Revenue and profit impact:** {}", r.revenue_impact);
    let _ = writeln!(md, "- **Recession signals:** {}", r.recession_signal);
    let _ = writeln!(md, "- **Supply and demand gaps:** {}", r.supply_demand_gap);
    let _ = writeln!(md, "- **Employment opportunity:** {}\n", r.employment_opportunity);
    md.push_str("## Conclusion\n\n");
    let _ = write!(
        md,
        "Taken together, the signals point to a {} outlook for {}. Watch employment and \
         demand indicators for confirmation.\n",
        r.sentiment.as_str().to_lowercase(),
        r.sector
    );
    md
}

/// Strip a wrapping ```markdown fence some models add despite the prompt.
fn unwrap_fence(reply: &str) -> &str {
    let t = reply.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    t
}

pub struct Narrator {
    chain: BackendChain,
    params: NarrativeParams,
}

impl Narrator {
    pub fn new(chain: BackendChain, params: NarrativeParams) -> Self {
        Self { chain, params }
    }

    /// Up to `attempts` passes over the chain.
    pub async fn try_generate(&self, item: &SourceItem, r: &AnalysisRecord) -> PipelineResult<String> {
        let req = GenerationRequest {
            prompt: build_narrative_prompt(item, r),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
        };
        let mut last = PipelineError::NarrativeUnavailable("no attempts".to_string());
        for attempt in 1..=self.params.attempts.max(1) {
            match self.chain.generate(&req).await {
                Ok((text, backend)) => {
                    let body = unwrap_fence(&text);
                    if !body.is_empty() {
                        tracing::debug!(target: "narrative", backend, attempt, "narrative generated");
                        return Ok(body.to_string());
                    }
                    last = PipelineError::NarrativeUnavailable("empty reply".to_string());
                }
                Err(e) => last = PipelineError::NarrativeUnavailable(e.to_string()),
            }
        }
        Err(last)
    }

    /// Generated body, or the templated fallback. Second value is `generated`.
    pub async fn write(&self, item: &SourceItem, r: &AnalysisRecord) -> (String, bool) {
        match self.try_generate(item, r).await {
            Ok(body) => (body, true),
            Err(e) => {
                tracing::warn!(
                    target: "narrative",
                    item = %locator_tag(&item.locator),
                    error = %e,
                    "narrative fell back to template"
                );
                counter!("pipeline_narrative_fallbacks_total").increment(1);
                (fallback_narrative(&item.title, r), false)
            }
        }
    }
}
