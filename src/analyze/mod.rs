// src/analyze/mod.rs
//! Per-item structured extraction and the sector saturation aggregate.

pub mod ai_adapter;
pub mod extractor;
pub mod record;
pub mod saturation;
pub mod weights;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{BackendChain, GenerationBackend, GenerationRequest};
pub use crate::analyze::extractor::StructuredExtractor;
pub use crate::analyze::record::{AnalysisRecord, SearchVolume, Sentiment};
pub use crate::analyze::saturation::{
    aggregate, aggregate_with, SaturationLevel, SaturationMap, SaturationScore,
};
pub use crate::analyze::weights::{HotReloadSaturationWeights, SaturationWeights};
