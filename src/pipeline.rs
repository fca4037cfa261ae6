// src/pipeline.rs
//! One run: list → (staggered, concurrent) fetch + extract per item →
//! aggregate → present. Nothing in here returns an error; every stage
//! substitutes and the run carries at most one banner.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::analyze::ai_adapter::{build_chain_from_config, BackendChain};
use crate::analyze::extractor::StructuredExtractor;
use crate::analyze::record::AnalysisRecord;
use crate::analyze::saturation::{aggregate_with, neutral_map, SaturationMap};
use crate::analyze::weights::HotReloadSaturationWeights;
use crate::config::PipelineConfig;
use crate::ingest::cache::SourceCache;
use crate::ingest::providers::{JinaReaderProvider, NewsApiProvider};
use crate::ingest::types::{ContentProvider, ExtractedContent, SearchProvider, SourceItem};
use crate::ingest::{fetch_content, list_sources_or_fallback, locator_tag, ListingFallback};
use crate::market::{MarketDataProvider, MarketSeriesPoint, TwelveDataProvider};
use crate::present::imagery::{ImageResolver, ImageSearchProvider, UnsplashProvider};
use crate::present::narrative::Narrator;
use crate::present::{records_csv, Presentation, PresentationAssembler};

pub const BANNER_EMPTY_TOPIC: &str = "Please enter a topic to analyze.";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs started.");
        describe_counter!("pipeline_items_total", "Items processed across runs.");
        describe_counter!(
            "pipeline_extraction_defaults_total",
            "Items whose analysis fell back to the default record."
        );
        describe_counter!(
            "pipeline_narrative_fallbacks_total",
            "Narratives rendered from the template."
        );
        describe_counter!(
            "pipeline_market_failures_total",
            "Runs without market data."
        );
        describe_histogram!("pipeline_run_ms", "End-to-end run time in milliseconds.");
    });
}

/// Everything one run produced. Owned by the caller, superseded by the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub topic: String,
    pub run_id: u64,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<SourceItem>,
    pub contents: Vec<ExtractedContent>,
    pub records: Vec<AnalysisRecord>,
    pub saturation: SaturationMap,
    pub market: Vec<MarketSeriesPoint>,
    pub presentation: Presentation,
    /// Records as CSV, header row first.
    pub csv: String,
    pub banner: Option<String>,
    pub used_placeholder_sources: bool,
}

/// External collaborators, injectable for tests.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchProvider>,
    pub content: Arc<dyn ContentProvider>,
    pub chain: BackendChain,
    pub market: Arc<dyn MarketDataProvider>,
    pub images: Option<Arc<dyn ImageSearchProvider>>,
    pub cache: Arc<dyn SourceCache>,
    pub weights: Arc<HotReloadSaturationWeights>,
}

impl Collaborators {
    /// Production wiring from a resolved config.
    pub fn from_config(cfg: &PipelineConfig, cache: Arc<dyn SourceCache>) -> Self {
        let p = &cfg.providers;
        let images: Option<Arc<dyn ImageSearchProvider>> = if p.images.has_key() {
            Some(Arc::new(UnsplashProvider::new(&p.images)))
        } else {
            None
        };
        Self {
            search: Arc::new(NewsApiProvider::new(&p.news, &cfg.language)),
            content: Arc::new(JinaReaderProvider::new(&p.reader)),
            chain: build_chain_from_config(cfg),
            market: Arc::new(TwelveDataProvider::new(&p.market)),
            images,
            cache,
            weights: Arc::new(HotReloadSaturationWeights::new(None)),
        }
    }
}

pub struct Pipeline {
    cfg: PipelineConfig,
    search: Arc<dyn SearchProvider>,
    content: Arc<dyn ContentProvider>,
    extractor: StructuredExtractor,
    market: Arc<dyn MarketDataProvider>,
    presenter: PresentationAssembler,
    cache: Arc<dyn SourceCache>,
    weights: Arc<HotReloadSaturationWeights>,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig, c: Collaborators) -> Self {
        let cfg = cfg.sanitized();
        let extractor = StructuredExtractor::new(c.chain.clone(), cfg.extraction, cfg.content_chars);
        let presenter = PresentationAssembler::new(
            Narrator::new(c.chain, cfg.narrative),
            ImageResolver::new(c.images),
            cfg.stagger(),
            cfg.item_timeout(),
        );
        Self {
            search: c.search,
            content: c.content,
            extractor,
            market: c.market,
            presenter,
            cache: c.cache,
            weights: c.weights,
            cfg,
        }
    }

    pub fn from_config(cfg: PipelineConfig, cache: Arc<dyn SourceCache>) -> Self {
        let c = Collaborators::from_config(&cfg, cache);
        Self::new(cfg, c)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub async fn run(&self, topic: &str) -> PipelineRun {
        self.run_with_id(topic, 0).await
    }

    pub async fn run_with_id(&self, topic: &str, run_id: u64) -> PipelineRun {
        ensure_metrics_described();
        let t0 = Instant::now();
        counter!("pipeline_runs_total").increment(1);
        let topic = topic.trim();

        if topic.is_empty() {
            tracing::info!(target: "pipeline", run_id, "empty topic rejected");
            return self.empty_run(topic, run_id, BANNER_EMPTY_TOPIC.to_string());
        }

        let listing = list_sources_or_fallback(
            self.search.as_ref(),
            self.cache.as_ref(),
            topic,
            self.cfg.max_items,
            &self.cfg.retry,
        )
        .await;
        let items = listing.items;

        let (processed, market) = tokio::join!(
            join_all(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.process_item(i, item.clone()))
            ),
            self.market_series()
        );
        let (contents, records): (Vec<_>, Vec<_>) = processed.into_iter().unzip();

        let saturation = aggregate_with(&records, &self.weights.current());
        let presentation = self
            .presenter
            .assemble(&items, &records, &saturation, &market)
            .await;

        // An item survives unless both its fetch and its extraction fell back.
        let survivors = contents
            .iter()
            .zip(&records)
            .filter(|(c, r)| !(c.fetch_failed && r.is_default()))
            .count();
        let banner = match listing.fallback {
            Some(ListingFallback::Placeholder) => Some(format!(
                "Live news is unavailable right now; showing placeholder content for \"{topic}\"."
            )),
            Some(ListingFallback::Cached) => Some(format!(
                "Live news is unavailable right now; showing the last saved articles for \"{topic}\"."
            )),
            None if survivors == 0 => {
                Some(format!("No articles could be processed for \"{topic}\"."))
            }
            None => None,
        };
        let csv = export_csv(&records);

        counter!("pipeline_items_total").increment(items.len() as u64);
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("pipeline_run_ms").record(elapsed_ms);
        tracing::info!(
            target: "pipeline",
            run_id,
            items = items.len(),
            defaults = records.iter().filter(|r| r.is_default()).count(),
            fetch_failures = contents.iter().filter(|c| c.fetch_failed).count(),
            market_points = market.len(),
            survivors,
            banner = banner.is_some(),
            elapsed_ms = elapsed_ms as u64,
            "run finished"
        );

        PipelineRun {
            topic: topic.to_string(),
            run_id,
            generated_at: Utc::now(),
            used_placeholder_sources: listing.fallback == Some(ListingFallback::Placeholder),
            items,
            contents,
            records,
            saturation,
            market,
            presentation,
            csv,
            banner,
        }
    }

    /// Fetch + extract for item `i`, started after `i * stagger` and bounded
    /// by the item budget. The fetch may use at most half of the budget, so a
    /// failed fetch still leaves room for a title-only extraction. Overrunning
    /// the whole budget degrades to the default record.
    async fn process_item(&self, i: usize, item: SourceItem) -> (ExtractedContent, AnalysisRecord) {
        let delay = self.cfg.stagger().saturating_mul(i as u32);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let budget = self.cfg.item_timeout();
        let deadline = tokio::time::Instant::now() + budget;

        let fetch = fetch_content(
            self.content.as_ref(),
            item.clone(),
            self.cfg.fetch_timeout(),
            &self.cfg.retry,
        );
        let content = match tokio::time::timeout(budget / 2, fetch).await {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!(
                    target: "pipeline",
                    item = %locator_tag(&item.locator),
                    budget_ms = (budget / 2).as_millis() as u64,
                    "fetch overran its share of the item budget"
                );
                counter!("pipeline_fetch_failures_total").increment(1);
                ExtractedContent::failed(item.clone())
            }
        };

        let outcome = tokio::time::timeout_at(deadline, self.extractor.extract(&content)).await;
        match outcome {
            Ok(record) => (content, record),
            Err(_) => {
                tracing::warn!(
                    target: "pipeline",
                    item = %locator_tag(&item.locator),
                    budget_ms = self.cfg.item_timeout_ms,
                    "item chain overran its budget"
                );
                counter!("pipeline_extraction_defaults_total").increment(1);
                (content, AnalysisRecord::default())
            }
        }
    }

    async fn market_series(&self) -> Vec<MarketSeriesPoint> {
        let res = self
            .cfg
            .retry
            .run_transient("market", |_| self.market.series(&self.cfg.market))
            .await;
        match res {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(target: "pipeline", provider = self.market.name(), error = %e, "market series unavailable");
                counter!("pipeline_market_failures_total").increment(1);
                Vec::new()
            }
        }
    }

    fn empty_run(&self, topic: &str, run_id: u64, banner: String) -> PipelineRun {
        let saturation = neutral_map(&self.weights.current());
        let presentation = Presentation {
            sentiment_histogram: crate::present::sentiment_histogram(&[]),
            saturation_series: crate::present::saturation_series(&saturation),
            ..Default::default()
        };
        PipelineRun {
            topic: topic.to_string(),
            run_id,
            generated_at: Utc::now(),
            items: Vec::new(),
            contents: Vec::new(),
            records: Vec::new(),
            saturation,
            market: Vec::new(),
            presentation,
            csv: export_csv(&[]),
            banner: Some(banner),
            used_placeholder_sources: false,
        }
    }
}

fn export_csv(records: &[AnalysisRecord]) -> String {
    match records_csv(records) {
        Ok(csv) => csv,
        Err(e) => {
            tracing::warn!(target: "pipeline", error = %e, "csv export failed");
            String::new()
        }
    }
}
