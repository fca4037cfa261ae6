// src/config/pipeline.rs
//! Pipeline configuration, loaded once and passed into the pipeline
//! constructor. No stage reads keys or tunables from the environment itself.
//!
//! Lookup order for `load_default()`:
//! 1) `$PIPELINE_CONFIG_PATH`
//! 2) `config/pipeline.json`
//! 3) `config/pipeline.toml`
//! 4) built-in defaults
//!
//! API keys set to `"ENV"` are resolved from the provider's env var.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::retry::RetryPolicy;

pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.json";
pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";

/// Marker meaning "read the key from the provider's env var".
const ENV_KEY_MARKER: &str = "ENV";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on articles per run.
    pub max_items: usize,
    pub language: String,
    pub fetch_timeout_ms: u64,
    /// Item `i` starts after `i * stagger_ms`.
    pub stagger_ms: u64,
    /// Hard budget for one item's fetch + extract chain.
    pub item_timeout_ms: u64,
    /// Characters of article text embedded in the extraction prompt.
    pub content_chars: usize,
    pub refresh_interval_secs: u64,
    /// Topic re-run in the background every refresh interval; an empty string
    /// disables the refresh.
    pub refresh_topic: String,
    pub retry: RetryPolicy,
    pub extraction: GenerationParams,
    pub narrative: NarrativeParams,
    pub market: MarketParams,
    pub providers: ProvidersConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_items: 5,
            language: "en".to_string(),
            fetch_timeout_ms: 30_000,
            stagger_ms: 1_200,
            item_timeout_ms: 180_000,
            content_chars: 2_000,
            refresh_interval_secs: 300,
            refresh_topic: "business".to_string(),
            retry: RetryPolicy::default(),
            extraction: GenerationParams::default(),
            narrative: NarrativeParams::default(),
            market: MarketParams::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1_000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Passes over the backend chain before the templated fallback is used.
    pub attempts: u32,
}

impl Default for NarrativeParams {
    fn default() -> Self {
        Self {
            max_tokens: 1_200,
            temperature: 0.7,
            attempts: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParams {
    pub symbol: String,
    pub interval: String,
    pub output_size: u32,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            symbol: "SPY".to_string(),
            interval: "1day".to_string(),
            output_size: 30,
        }
    }
}

/// One external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    /// `"ENV"`, a literal key, or empty for keyless providers.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl ProviderEndpoint {
    fn new(base_url: &str, api_key: &str, model: Option<&str>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.map(str::to_string),
            timeout_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn has_key(&self) -> bool {
        let k = self.api_key.trim();
        !k.is_empty() && !k.eq_ignore_ascii_case(ENV_KEY_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub news: ProviderEndpoint,
    pub reader: ProviderEndpoint,
    pub together: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
    pub market: ProviderEndpoint,
    pub images: ProviderEndpoint,
    /// Generation backends tried in this order ("together" | "gemini").
    pub generation_order: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            news: ProviderEndpoint::new("https://newsapi.org", ENV_KEY_MARKER, None, 10_000),
            reader: ProviderEndpoint::new("https://r.jina.ai", "", None, 30_000),
            together: ProviderEndpoint::new(
                "https://api.together.xyz",
                ENV_KEY_MARKER,
                Some("mistralai/Mixtral-8x7B-Instruct-v0.1"),
                60_000,
            ),
            gemini: ProviderEndpoint::new(
                "https://generativelanguage.googleapis.com",
                ENV_KEY_MARKER,
                Some("gemini-1.5-flash"),
                60_000,
            ),
            market: ProviderEndpoint::new("https://api.twelvedata.com", ENV_KEY_MARKER, None, 10_000),
            images: ProviderEndpoint::new("https://api.unsplash.com", ENV_KEY_MARKER, None, 10_000),
            generation_order: vec!["together".to_string(), "gemini".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. JSON or TOML, chosen by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&data, &ext)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        Ok(cfg.resolved())
    }

    /// Env var + file fallbacks; built-in defaults when no file exists.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_PIPELINE_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_PIPELINE_CONFIG_PATH, "config/pipeline.toml"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Ok(Self::default().resolved())
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "toml" {
            return Ok(toml::from_str(s)?);
        }
        match serde_json::from_str(s) {
            Ok(cfg) => Ok(cfg),
            Err(json_err) => toml::from_str(s).map_err(|_| anyhow!(json_err)),
        }
    }

    /// Resolve `"ENV"` keys and clamp tunables into sane ranges.
    pub fn resolved(mut self) -> Self {
        let p = &mut self.providers;
        resolve_key(&mut p.news.api_key, "NEWS_API_KEY");
        resolve_key(&mut p.reader.api_key, "JINA_API_KEY");
        resolve_key(&mut p.together.api_key, "TOGETHER_API_KEY");
        resolve_key(&mut p.gemini.api_key, "GEMINI_API_KEY");
        resolve_key(&mut p.market.api_key, "TWELVE_DATA_API_KEY");
        resolve_key(&mut p.images.api_key, "UNSPLASH_API_KEY");
        self.sanitized()
    }

    pub fn sanitized(mut self) -> Self {
        self.max_items = self.max_items.clamp(1, 50);
        self.fetch_timeout_ms = self.fetch_timeout_ms.max(1);
        // The fetch gets half of the item budget; one attempt must fit in it.
        self.item_timeout_ms = self
            .item_timeout_ms
            .max(self.fetch_timeout_ms.saturating_mul(2));
        self.content_chars = self.content_chars.max(1);
        self.refresh_interval_secs = self.refresh_interval_secs.max(1);
        self.retry = self.retry.sanitized();
        self.narrative.attempts = self.narrative.attempts.max(1);
        if !(0.0..=2.0).contains(&self.extraction.temperature) {
            self.extraction.temperature = GenerationParams::default().temperature;
        }
        if !(0.0..=2.0).contains(&self.narrative.temperature) {
            self.narrative.temperature = NarrativeParams::default().temperature;
        }
        self.refresh_topic = self.refresh_topic.trim().to_string();
        if self.language.trim().is_empty() {
            self.language = "en".to_string();
        }
        self.providers
            .generation_order
            .iter_mut()
            .for_each(|name| *name = name.trim().to_ascii_lowercase());
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn resolve_key(slot: &mut String, var: &str) {
    if !slot.trim().eq_ignore_ascii_case(ENV_KEY_MARKER) {
        return;
    }
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => *slot = v.trim().to_string(),
        _ => {
            // Keep going without it: the provider degrades to its fallback.
            tracing::warn!(target: "config", var, "api key env var missing");
            slot.clear();
        }
    }
}
