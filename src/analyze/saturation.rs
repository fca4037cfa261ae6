// src/analyze/saturation.rs
//! Per-sector job-saturation score. Pure function of the record set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyze::record::{AnalysisRecord, Sentiment, DEFAULT_SECTOR};
use crate::analyze::weights::SaturationWeights;

/// Sectors always present in the output.
pub const SECTORS: [&str; 5] = ["Tech", "Finance", "Healthcare", "Energy", "General"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaturationLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaturationScore {
    pub sector: String,
    pub level: SaturationLevel,
    pub score: u8,
}

/// Keyed by sector name, so iteration order is by name.
pub type SaturationMap = BTreeMap<String, SaturationScore>;

pub fn level_for(score: i32, w: &SaturationWeights) -> SaturationLevel {
    if score < w.low_below {
        SaturationLevel::Low
    } else if score >= w.high_from {
        SaturationLevel::High
    } else {
        SaturationLevel::Medium
    }
}

fn score_for(sector: &str, sum: i32, w: &SaturationWeights) -> SaturationScore {
    let score = (w.baseline + sum).clamp(0, 100);
    SaturationScore {
        sector: sector.to_string(),
        level: level_for(score, w),
        score: score as u8,
    }
}

/// Known sectors under their canonical spelling; others trimmed as given.
pub fn canonical_sector(label: &str) -> String {
    let t = label.trim();
    if t.is_empty() {
        return DEFAULT_SECTOR.to_string();
    }
    SECTORS
        .iter()
        .find(|s| s.eq_ignore_ascii_case(t))
        .map(|s| s.to_string())
        .unwrap_or_else(|| t.to_string())
}

/// Lowercase + collapse whitespace, so matching ignores case and spacing.
fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn matches_any(text: &str, terms: &[String]) -> bool {
    let t = normalize(text);
    terms
        .iter()
        .map(|p| normalize(p))
        .any(|p| !p.is_empty() && t.contains(p.as_str()))
}

/// Sum of the four terms for one record.
pub fn record_terms(r: &AnalysisRecord, w: &SaturationWeights) -> i32 {
    let employment = if matches_any(&r.employment_opportunity, &w.employment_growth_terms) {
        w.employment_growth
    } else if matches_any(&r.employment_opportunity, &w.employment_decline_terms) {
        w.employment_decline
    } else {
        0
    };
    let recession = if matches_any(&r.recession_signal, &w.recession_terms) {
        w.recession
    } else {
        0
    };
    let sentiment = match r.sentiment {
        Sentiment::Positive => w.positive_sentiment,
        Sentiment::Negative => w.negative_sentiment,
        Sentiment::Neutral => 0,
    };
    let supply = if matches_any(&r.supply_demand_gap, &w.supply_gap_terms) {
        w.supply_gap
    } else {
        0
    };
    employment + recession + sentiment + supply
}

/// Every glossary sector at the baseline.
pub fn neutral_map(w: &SaturationWeights) -> SaturationMap {
    SECTORS
        .iter()
        .map(|s| (s.to_string(), score_for(s, 0, w)))
        .collect()
}

pub fn aggregate(records: &[AnalysisRecord]) -> SaturationMap {
    aggregate_with(records, &SaturationWeights::default())
}

pub fn aggregate_with(records: &[AnalysisRecord], w: &SaturationWeights) -> SaturationMap {
    let mut sums: BTreeMap<String, i32> = BTreeMap::new();
    for r in records {
        *sums.entry(canonical_sector(&r.sector)).or_insert(0) += record_terms(r, w);
    }

    let mut out = neutral_map(w);
    for (sector, sum) in sums {
        let score = score_for(&sector, sum, w);
        out.insert(sector, score);
    }
    out
}
