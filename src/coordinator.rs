// src/coordinator.rs
//! Owns the in-flight run. Submitting a new run aborts the stale one, and a
//! result whose id is no longer current is discarded instead of published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tokio::task::AbortHandle;

use crate::pipeline::{Pipeline, PipelineRun};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("run {0} was superseded by a newer run")]
    Superseded(u64),
    #[error("run {0} failed: {1}")]
    Failed(u64, String),
}

pub struct RunCoordinator {
    pipeline: Arc<Pipeline>,
    current: AtomicU64,
    inflight: Mutex<Option<AbortHandle>>,
    latest: RwLock<Option<Arc<PipelineRun>>>,
}

impl RunCoordinator {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            current: AtomicU64::new(0),
            inflight: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Id of the most recently submitted run (0 before the first).
    pub fn current_id(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Most recent run that completed while still current.
    pub fn latest(&self) -> Option<Arc<PipelineRun>> {
        self.latest
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Start a run for `topic`, superseding any run still in flight, and wait
    /// for it.
    pub async fn submit(&self, topic: &str) -> Result<Arc<PipelineRun>, RunError> {
        let pipeline = self.pipeline.clone();
        let topic = topic.to_string();

        let (run_id, handle) = {
            let mut slot = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
            let run_id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            let handle =
                tokio::spawn(async move { pipeline.run_with_id(&topic, run_id).await });
            if let Some(stale) = slot.replace(handle.abort_handle()) {
                stale.abort();
                tracing::info!(target: "coordinator", run_id, "stale run aborted");
            }
            (run_id, handle)
        };

        match handle.await {
            Ok(run) => {
                let mut latest = self.latest.write().unwrap_or_else(|p| p.into_inner());
                // Checked under the lock so a newer run's result is never overwritten.
                if self.current_id() != run_id {
                    tracing::debug!(target: "coordinator", run_id, "discarding superseded result");
                    return Err(RunError::Superseded(run_id));
                }
                let run = Arc::new(run);
                *latest = Some(run.clone());
                Ok(run)
            }
            Err(e) if e.is_cancelled() => Err(RunError::Superseded(run_id)),
            Err(e) => {
                tracing::warn!(target: "coordinator", run_id, error = %e, "run task failed");
                Err(RunError::Failed(run_id, e.to_string()))
            }
        }
    }
}
