// tests/narrative_fallback.rs
//
// Narratives: generated path, bounded attempts, and the deterministic
// templated fallback.

mod common;

use common::{fast_retry, ScriptedBackend};
use evolvex_trends::ai_adapter::BackendChain;
use evolvex_trends::analyze::record::{AnalysisRecord, SearchVolume, Sentiment};
use evolvex_trends::config::NarrativeParams;
use evolvex_trends::error::PipelineError;
use evolvex_trends::ingest::types::SourceItem;
use evolvex_trends::present::narrative::{fallback_narrative, Narrator};

fn record() -> AnalysisRecord {
    AnalysisRecord {
        sentiment: Sentiment::Positive,
        emotion: "Optimism".into(),
        polarity_score: 0.4,
        search_volume: SearchVolume::High,
        revenue_impact: "Higher margins".into(),
        recession_signal: "None".into(),
        supply_demand_gap: "Battery shortage".into(),
        employment_opportunity: "New plant hiring".into(),
        sector: "Energy".into(),
    }
}

fn item() -> SourceItem {
    SourceItem {
        title: "Gigafactory expansion".into(),
        locator: "https://news.test/giga".into(),
        short_description: "A new plant".into(),
    }
}

#[test]
fn fallback_is_byte_identical_across_calls() {
    let r = record();
    let a = fallback_narrative("Gigafactory expansion", &r);
    for _ in 0..10 {
        assert_eq!(fallback_narrative("Gigafactory expansion", &r), a);
    }
    assert!(a.contains("## Introduction"));
    assert!(a.contains("## Key Insights"));
    assert!(a.contains("## Conclusion"));
    assert!(a.contains("Battery shortage"));
}

#[tokio::test]
async fn failing_chain_uses_template_after_configured_attempts() {
    let backend = ScriptedBackend::failing(PipelineError::Status(400));
    let narrator = Narrator::new(
        BackendChain::new(vec![backend.clone()], fast_retry(1)),
        NarrativeParams {
            attempts: 3,
            ..Default::default()
        },
    );
    let (body, generated) = narrator.write(&item(), &record()).await;
    assert!(!generated);
    assert_eq!(body, fallback_narrative("Gigafactory expansion", &record()));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn generated_body_is_used_and_prompt_is_not_json() {
    let backend = ScriptedBackend::replying("## Introduction\n\nA plant opens.");
    let narrator = Narrator::new(
        BackendChain::new(vec![backend.clone()], fast_retry(1)),
        NarrativeParams::default(),
    );
    let (body, generated) = narrator.write(&item(), &record()).await;
    assert!(generated);
    assert_eq!(body, "## Introduction\n\nA plant opens.");

    let prompt = &backend.prompts()[0];
    assert!(prompt.contains("500 to 700 words"));
    assert!(prompt.contains("Battery shortage"));
    assert!(!prompt.contains("Overall_Sentiment"));
}

#[tokio::test]
async fn blank_reply_counts_as_failure() {
    let backend = ScriptedBackend::replying("   ");
    let narrator = Narrator::new(
        BackendChain::new(vec![backend.clone()], fast_retry(1)),
        NarrativeParams {
            attempts: 2,
            ..Default::default()
        },
    );
    let (_, generated) = narrator.write(&item(), &record()).await;
    assert!(!generated);
    assert_eq!(backend.calls(), 2);
}
