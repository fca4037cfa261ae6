// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod market;
pub mod metrics;
pub mod pipeline;
pub mod present;
pub mod retry;

// News listing, content fetch, source cache, refresh scheduler
pub mod ingest;

// Structured extraction and sector saturation
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::ai_adapter;
pub use crate::api::{router, AppState};
pub use crate::config::PipelineConfig;
pub use crate::coordinator::{RunCoordinator, RunError};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::pipeline::{Collaborators, Pipeline, PipelineRun};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the tracing subscriber for the binaries. `RUST_LOG` wins over the
/// default filter; `LOG_FORMAT=json` switches to JSON lines. A subscriber
/// that is already installed (e.g. by the Shuttle runtime) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("evolvex_trends=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Call this from the Shuttle entrypoint (after tracing init) to perform a
/// one-off smoke test of the generation chain. It won't panic on failure; it
/// just logs the result.
pub async fn run_generation_quick_probe(rt: &bootstrap::PipelineRuntime) {
    rt.quick_probe().await;
    tracing::info!("generation quick probe finished");
}
