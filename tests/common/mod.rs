// tests/common/mod.rs
// Shared fixtures: local provider servers and in-process stub collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use evolvex_trends::ai_adapter::{
    BackendChain, DynBackend, GenerationBackend, GenerationRequest, MockBackend,
};
use evolvex_trends::analyze::record::KEY_SENTIMENT;
use evolvex_trends::analyze::weights::HotReloadSaturationWeights;
use evolvex_trends::config::{MarketParams, PipelineConfig};
use evolvex_trends::error::{PipelineError, PipelineResult};
use evolvex_trends::ingest::cache::{InMemorySourceCache, SourceCache};
use evolvex_trends::ingest::types::{ContentProvider, SearchProvider, SourceItem};
use evolvex_trends::market::{MarketDataProvider, MarketSeriesPoint};
use evolvex_trends::pipeline::Collaborators;
use evolvex_trends::retry::RetryPolicy;

/// Serve `router` on an ephemeral local port; returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

/// Fast retry policy for tests.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), 1.0)
}

/// Config with no stagger, short budgets and fast retries.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        stagger_ms: 0,
        fetch_timeout_ms: 500,
        item_timeout_ms: 5_000,
        retry: fast_retry(2),
        ..Default::default()
    }
}

pub fn item(n: usize) -> SourceItem {
    SourceItem {
        title: format!("Article {n} about hiring"),
        locator: format!("https://news.test/{n}"),
        short_description: format!("Summary {n}"),
    }
}

// ---------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------

pub struct StaticSearch {
    pub result: PipelineResult<Vec<SourceItem>>,
    pub delay: Duration,
    pub calls: AtomicU32,
}

impl StaticSearch {
    pub fn ok(items: Vec<SourceItem>) -> Self {
        Self {
            result: Ok(items),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(PipelineError::SourceUnavailable("down".into())),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn slow(items: Vec<SourceItem>, delay: Duration) -> Self {
        Self {
            result: Ok(items),
            delay,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _topic: &str, limit: usize) -> PipelineResult<Vec<SourceItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
            .clone()
            .map(|v| v.into_iter().take(limit).collect())
    }
    fn name(&self) -> &'static str {
        "static-search"
    }
}

/// Returns "Full text of <locator>" for every locator.
pub struct EchoContent;

#[async_trait]
impl ContentProvider for EchoContent {
    async fn fetch_text(&self, locator: &str) -> PipelineResult<String> {
        Ok(format!("Full text of {locator}"))
    }
    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Every fetch fails with a non-transient status.
pub struct FailingContent;

#[async_trait]
impl ContentProvider for FailingContent {
    async fn fetch_text(&self, _locator: &str) -> PipelineResult<String> {
        Err(PipelineError::Status(404))
    }
    fn name(&self) -> &'static str {
        "failing-content"
    }
}

/// Answers only after `delay`.
pub struct SlowContent(pub Duration);

#[async_trait]
impl ContentProvider for SlowContent {
    async fn fetch_text(&self, locator: &str) -> PipelineResult<String> {
        tokio::time::sleep(self.0).await;
        Ok(format!("Full text of {locator}"))
    }
    fn name(&self) -> &'static str {
        "slow-content"
    }
}

/// Echoes like `EchoContent` and records when each locator was requested.
#[derive(Default)]
pub struct RecordingContent {
    starts: Mutex<HashMap<String, Instant>>,
}

impl RecordingContent {
    pub fn started_at(&self, locator: &str) -> Instant {
        *self
            .starts
            .lock()
            .unwrap()
            .get(locator)
            .unwrap_or_else(|| panic!("{locator} was never fetched"))
    }
}

#[async_trait]
impl ContentProvider for RecordingContent {
    async fn fetch_text(&self, locator: &str) -> PipelineResult<String> {
        self.starts
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_insert_with(Instant::now);
        Ok(format!("Full text of {locator}"))
    }
    fn name(&self) -> &'static str {
        "recording-content"
    }
}

pub struct StaticMarket(pub PipelineResult<Vec<MarketSeriesPoint>>);

#[async_trait]
impl MarketDataProvider for StaticMarket {
    async fn series(&self, _params: &MarketParams) -> PipelineResult<Vec<MarketSeriesPoint>> {
        self.0.clone()
    }
    fn name(&self) -> &'static str {
        "static-market"
    }
}

pub fn closes(values: &[f64]) -> Vec<MarketSeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, c)| MarketSeriesPoint {
            date: format!("2024-01-{:02}", i + 1),
            close: *c,
        })
        .collect()
}

/// Backend returning a fixed reply (or error) and recording prompts.
pub struct ScriptedBackend {
    pub reply: PipelineResult<String>,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: PipelineError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.prompt.clone());
        let out = self.reply.clone();
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Extraction prompts get the mock record at once; narrative prompts are
/// answered after `narrative_delay`, and their start times are recorded by title.
pub struct TimedBackend {
    pub narrative_delay: Duration,
    narrative_starts: Mutex<HashMap<String, Instant>>,
}

impl TimedBackend {
    pub fn new(narrative_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            narrative_delay,
            narrative_starts: Mutex::new(HashMap::new()),
        })
    }

    pub fn narrative_started_at(&self, title: &str) -> Instant {
        *self
            .narrative_starts
            .lock()
            .unwrap()
            .get(title)
            .unwrap_or_else(|| panic!("no narrative requested for {title}"))
    }
}

impl GenerationBackend for TimedBackend {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        static MOCK: MockBackend = MockBackend;
        if req.prompt.contains(KEY_SENTIMENT) {
            return MOCK.generate(req);
        }
        let title = req
            .prompt
            .lines()
            .find_map(|l| l.strip_prefix("Title: "))
            .unwrap_or_default()
            .to_string();
        self.narrative_starts
            .lock()
            .unwrap()
            .entry(title)
            .or_insert_with(Instant::now);
        let delay = self.narrative_delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok("## Introduction\n\nGenerated.".to_string())
        })
    }
    fn name(&self) -> &'static str {
        "timed"
    }
}

pub fn chain_of(backend: DynBackend) -> BackendChain {
    BackendChain::new(vec![backend], RetryPolicy::no_retry())
}

pub fn mock_chain() -> BackendChain {
    BackendChain::new(vec![Arc::new(MockBackend)], RetryPolicy::no_retry())
}

/// In-process collaborators: given search, echo content, mock generation,
/// fixed market series, no image search, empty in-memory cache.
pub fn stub_collaborators(search: Arc<dyn SearchProvider>) -> Collaborators {
    let cache: Arc<dyn SourceCache> = Arc::new(InMemorySourceCache::new());
    Collaborators {
        search,
        content: Arc::new(EchoContent),
        chain: mock_chain(),
        market: Arc::new(StaticMarket(Ok(closes(&[100.0, 101.0, 99.0])))),
        images: None,
        cache,
        weights: Arc::new(HotReloadSaturationWeights::new(Some(
            std::path::Path::new("tests/fixtures/no_such_weights.json"),
        ))),
    }
}
