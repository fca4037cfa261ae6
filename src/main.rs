//! Evolvex trends service: binary entrypoint.
//! Boots the Axum HTTP server, wires the run coordinator, metrics and the
//! periodic refresh task.

use evolvex_trends::bootstrap::PipelineRuntime;
use evolvex_trends::metrics::Metrics;
use evolvex_trends::{api, init_tracing, run_generation_quick_probe};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let rt = PipelineRuntime::load_default()?;

    // The recorder can only be installed once per process; serve without
    // /metrics rather than fail the boot.
    let metrics = match Metrics::init(rt.cfg.refresh_interval_secs) {
        Ok(m) => Some(m.handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    if std::env::var("GENERATION_QUICK_PROBE")
        .ok()
        .is_some_and(|v| v == "1")
    {
        run_generation_quick_probe(&rt).await;
    }

    if let Some(_refresh) = rt.spawn_refresh() {
        tracing::info!(
            topic = %rt.cfg.refresh_topic,
            every_secs = rt.cfg.refresh_interval_secs,
            "periodic refresh enabled"
        );
    }

    let state = api::AppState {
        coordinator: rt.coordinator.clone(),
        metrics,
    };
    let router = api::router(state);

    Ok(router.into())
}
