// src/present/mod.rs
//! Chart-ready datasets plus one narrative per item.

pub mod export;
pub mod imagery;
pub mod narrative;

use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::analyze::record::{AnalysisRecord, Sentiment};
use crate::analyze::saturation::{SaturationMap, SaturationScore};
use crate::ingest::locator_tag;
use crate::ingest::types::SourceItem;
use crate::market::{percent_change_series, MarketSeriesPoint, PercentChangePoint};

pub use export::records_csv;
pub use imagery::{
    offline_image_for, ImageResolver, ImageSearchProvider, UnsplashProvider, PLACEHOLDER_IMAGE,
};
pub use narrative::{fallback_narrative, Narrative, Narrator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    /// Label → count; all three labels are always present.
    pub sentiment_histogram: BTreeMap<String, usize>,
    /// One polarity per item, in item order.
    pub polarity_series: Vec<f64>,
    /// Ordered by sector name.
    pub saturation_series: Vec<SaturationScore>,
    pub market_change: Vec<PercentChangePoint>,
    pub narratives: Vec<Narrative>,
}

pub fn sentiment_histogram(records: &[AnalysisRecord]) -> BTreeMap<String, usize> {
    let mut h: BTreeMap<String, usize> = Sentiment::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for r in records {
        *h.entry(r.sentiment.as_str().to_string()).or_insert(0) += 1;
    }
    h
}

pub fn polarity_series(records: &[AnalysisRecord]) -> Vec<f64> {
    records.iter().map(|r| r.polarity_score).collect()
}

pub fn saturation_series(map: &SaturationMap) -> Vec<SaturationScore> {
    map.values().cloned().collect()
}

pub struct PresentationAssembler {
    narrator: Narrator,
    images: ImageResolver,
    stagger: Duration,
    /// Budget for one item's narrative + image.
    budget: Duration,
}

impl PresentationAssembler {
    pub fn new(
        narrator: Narrator,
        images: ImageResolver,
        stagger: Duration,
        budget: Duration,
    ) -> Self {
        Self {
            narrator,
            images,
            stagger,
            budget,
        }
    }

    /// Narrative + cover image for item `i`, started after `i * stagger`.
    /// Overrunning the budget yields the template and an offline image.
    async fn narrative_for(&self, i: usize, item: &SourceItem, r: &AnalysisRecord) -> Narrative {
        let delay = self.stagger.saturating_mul(i as u32);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let build = async {
            let ((body, generated), image_url) =
                tokio::join!(self.narrator.write(item, r), self.images.resolve(&item.title, r));
            Narrative {
                title: item.title.clone(),
                body_markdown: body,
                image_url,
                generated,
            }
        };
        let outcome = tokio::time::timeout(self.budget, build).await;
        match outcome {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    target: "narrative",
                    item = %locator_tag(&item.locator),
                    budget_ms = self.budget.as_millis() as u64,
                    "narrative overran its budget"
                );
                counter!("pipeline_narrative_fallbacks_total").increment(1);
                Narrative {
                    title: item.title.clone(),
                    body_markdown: fallback_narrative(&item.title, r),
                    image_url: offline_image_for(r),
                    generated: false,
                }
            }
        }
    }

    /// `items` and `records` are parallel slices.
    pub async fn assemble(
        &self,
        items: &[SourceItem],
        records: &[AnalysisRecord],
        saturation: &SaturationMap,
        market: &[MarketSeriesPoint],
    ) -> Presentation {
        let narratives = join_all(
            items
                .iter()
                .zip(records)
                .enumerate()
                .map(|(i, (item, r))| self.narrative_for(i, item, r)),
        )
        .await;

        Presentation {
            sentiment_histogram: sentiment_histogram(records),
            polarity_series: polarity_series(records),
            saturation_series: saturation_series(saturation),
            market_change: percent_change_series(market),
            narratives,
        }
    }
}
