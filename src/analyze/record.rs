// src/analyze/record.rs
//! The fixed-shape analysis record and its strict JSON reader.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::PipelineError;

pub const KEY_SENTIMENT: &str = "Overall_Sentiment";
pub const KEY_EMOTION: &str = "Emotion_Detection";
pub const KEY_POLARITY: &str = "Polarity_Score";
pub const KEY_SEARCH_VOLUME: &str = "Search_Volume";
pub const KEY_REVENUE: &str = "Revenue_Profit_Impact";
pub const KEY_RECESSION: &str = "Recession_Signals";
pub const KEY_SUPPLY_DEMAND: &str = "Supply_Demand_Gaps";
pub const KEY_EMPLOYMENT: &str = "Employment_Opportunity";
pub const KEY_SECTOR: &str = "Sector";

/// Every key a reply object must carry, in prompt order.
pub const RECORD_KEYS: [&str; 9] = [
    KEY_SENTIMENT,
    KEY_EMOTION,
    KEY_POLARITY,
    KEY_SEARCH_VOLUME,
    KEY_REVENUE,
    KEY_RECESSION,
    KEY_SUPPLY_DEMAND,
    KEY_EMPLOYMENT,
    KEY_SECTOR,
];

const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_SECTOR: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Positive, Self::Negative, Self::Neutral];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchVolume {
    High,
    Medium,
    Low,
}

impl SearchVolume {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::High, Self::Medium, Self::Low]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for SearchVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One article's structured analysis. All nine fields are always present;
/// anything the extractor cannot fill completely becomes `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(rename = "Overall_Sentiment")]
    pub sentiment: Sentiment,
    #[serde(rename = "Emotion_Detection")]
    pub emotion: String,
    #[serde(rename = "Polarity_Score")]
    pub polarity_score: f64,
    #[serde(rename = "Search_Volume")]
    pub search_volume: SearchVolume,
    #[serde(rename = "Revenue_Profit_Impact")]
    pub revenue_impact: String,
    #[serde(rename = "Recession_Signals")]
    pub recession_signal: String,
    #[serde(rename = "Supply_Demand_Gaps")]
    pub supply_demand_gap: String,
    #[serde(rename = "Employment_Opportunity")]
    pub employment_opportunity: String,
    #[serde(rename = "Sector")]
    pub sector: String,
}

impl Default for AnalysisRecord {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            emotion: NOT_AVAILABLE.to_string(),
            polarity_score: 0.0,
            search_volume: SearchVolume::Medium,
            revenue_impact: NOT_AVAILABLE.to_string(),
            recession_signal: NOT_AVAILABLE.to_string(),
            supply_demand_gap: NOT_AVAILABLE.to_string(),
            employment_opportunity: NOT_AVAILABLE.to_string(),
            sector: DEFAULT_SECTOR.to_string(),
        }
    }
}

impl AnalysisRecord {
    /// Strict reader: the object must carry all nine keys with well-typed,
    /// non-empty values. Only the polarity is coerced.
    pub fn from_json_value(v: &Value) -> Result<Self, PipelineError> {
        let obj = v
            .as_object()
            .ok_or_else(|| malformed("reply is not a JSON object"))?;

        if let Some(missing) = RECORD_KEYS.iter().find(|k| !obj.contains_key(**k)) {
            return Err(malformed(&format!("missing key {missing}")));
        }

        let sentiment_raw = required_str(obj, KEY_SENTIMENT)?;
        let sentiment = Sentiment::parse(&sentiment_raw)
            .ok_or_else(|| malformed(&format!("unknown sentiment {sentiment_raw:?}")))?;
        let volume_raw = required_str(obj, KEY_SEARCH_VOLUME)?;
        let search_volume = SearchVolume::parse(&volume_raw)
            .ok_or_else(|| malformed(&format!("unknown search volume {volume_raw:?}")))?;

        Ok(Self {
            sentiment,
            emotion: required_str(obj, KEY_EMOTION)?,
            polarity_score: coerce_polarity(obj.get(KEY_POLARITY).unwrap_or(&Value::Null)),
            search_volume,
            revenue_impact: required_str(obj, KEY_REVENUE)?,
            recession_signal: required_str(obj, KEY_RECESSION)?,
            supply_demand_gap: required_str(obj, KEY_SUPPLY_DEMAND)?,
            employment_opportunity: required_str(obj, KEY_EMPLOYMENT)?,
            sector: required_str(obj, KEY_SECTOR)?,
        })
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn malformed(msg: &str) -> PipelineError {
    PipelineError::ExtractionMalformed(msg.to_string())
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, PipelineError> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(malformed(&format!("empty value for {key}"))),
        Some(other) => Err(malformed(&format!("{key} is not a string: {other}"))),
        None => Err(malformed(&format!("missing key {key}"))),
    }
}

/// Number or numeric string, clamped into [-1, 1]. Anything else is 0.
pub fn coerce_polarity(v: &Value) -> f64 {
    let raw = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(x) if x.is_finite() => x.clamp(-1.0, 1.0),
        _ => 0.0,
    }
}
