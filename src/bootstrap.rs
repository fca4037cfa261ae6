// src/bootstrap.rs
use crate::analyze::ai_adapter::{build_chain_from_config, GenerationRequest};
use crate::config::PipelineConfig;
use crate::coordinator::RunCoordinator;
use crate::ingest::cache::{FileSourceCache, SourceCache};
use crate::ingest::scheduler::spawn_refresh_task;
use crate::pipeline::Pipeline;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Config + the long-lived coordinator built from it.
pub struct PipelineRuntime {
    pub cfg: PipelineConfig,
    pub coordinator: Arc<RunCoordinator>,
}

impl PipelineRuntime {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cfg = PipelineConfig::load_from_file(path.as_ref())
            .with_context(|| format!("loading {}", path.as_ref().display()))?;
        Ok(Self::from_config(cfg))
    }

    /// `$PIPELINE_CONFIG_PATH`, then `config/`, then defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        Ok(Self::from_config(PipelineConfig::load_default()?))
    }

    pub fn from_config(cfg: PipelineConfig) -> Self {
        let p = &cfg.providers;
        // Diagnostics only: which keys resolved, never the keys themselves.
        info!(
            news = p.news.has_key(),
            together = p.together.has_key(),
            gemini = p.gemini.has_key(),
            market = p.market.has_key(),
            images = p.images.has_key(),
            max_items = cfg.max_items,
            "pipeline cfg loaded"
        );
        let cache: Arc<dyn SourceCache> = Arc::new(FileSourceCache::new(FileSourceCache::default_dir()));
        let pipeline = Arc::new(Pipeline::from_config(cfg.clone(), cache));
        Self {
            cfg,
            coordinator: Arc::new(RunCoordinator::new(pipeline)),
        }
    }

    /// One short generation call through the configured chain; logs only.
    pub async fn quick_probe(&self) {
        let chain = build_chain_from_config(&self.cfg);
        let req = GenerationRequest {
            prompt: "Reply with the single word: ready".to_string(),
            max_tokens: 8,
            temperature: 0.0,
        };
        match chain.generate(&req).await {
            Ok((_, backend)) => info!(backend, "generation quick_probe ok"),
            Err(e) => warn!(error = %e, backends = ?chain.names(), "generation quick_probe failed"),
        }
    }

    /// Background refresh for `refresh_topic`, if one is configured.
    pub fn spawn_refresh(&self) -> Option<JoinHandle<()>> {
        if self.cfg.refresh_topic.is_empty() {
            return None;
        }
        Some(spawn_refresh_task(
            self.coordinator.clone(),
            self.cfg.refresh_topic.clone(),
            self.cfg.refresh_interval(),
        ))
    }
}
