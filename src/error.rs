//! Failure taxonomy shared by every pipeline stage.
//!
//! Stages never let these escape a run: each one is caught at the smallest
//! scope and turned into a substitution value (cached/placeholder items,
//! empty text, default record, templated narrative). The enum exists so the
//! substitution sites and the retry policy can tell failures apart.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Search provider failed or returned nothing usable.
    #[error("search provider unavailable: {0}")]
    SourceUnavailable(String),
    #[error("content fetch timed out after {0:?}")]
    FetchTimeout(Duration),
    #[error("content fetch failed: {0}")]
    FetchFailed(String),
    /// Reply arrived but did not contain a complete analysis object.
    #[error("extraction reply malformed: {0}")]
    ExtractionMalformed(String),
    /// Every generation backend failed.
    #[error("extraction unavailable: {0}")]
    ExtractionUnavailable(String),
    #[error("narrative unavailable: {0}")]
    NarrativeUnavailable(String),
    #[error("market data unavailable: {0}")]
    MarketUnavailable(String),
    #[error("image search unavailable: {0}")]
    ImageUnavailable(String),

    // --- provider-level failures, mapped into the stage variants above ---
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider reply malformed: {0}")]
    Malformed(String),
    #[error("provider not configured: {0}")]
    Unconfigured(&'static str),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Only transport-level hiccups are worth another attempt. A parse failure
    /// stays a parse failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::FetchTimeout(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Classify a reqwest error. `timeout` is the budget the request ran with.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Shared client builder for the provider adapters.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("evolvex-trends/0.1")
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http client builder failed, using defaults");
            reqwest::Client::new()
        })
}
