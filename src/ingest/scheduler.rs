// src/ingest/scheduler.rs
use crate::coordinator::RunCoordinator;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Re-run the pipeline for `topic` every `interval` through the coordinator,
/// so a refresh supersedes any in-flight run the same way a user request does.
/// The first tick fires immediately.
pub fn spawn_refresh_task(
    coordinator: Arc<RunCoordinator>,
    topic: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            counter!("pipeline_refresh_ticks_total").increment(1);
            match coordinator.submit(&topic).await {
                Ok(run) => {
                    let now = chrono::Utc::now().timestamp().max(0) as u64;
                    gauge!("pipeline_last_refresh_ts").set(now as f64);
                    tracing::info!(
                        target: "scheduler",
                        run_id = run.run_id,
                        items = run.items.len(),
                        banner = run.banner.is_some(),
                        "refresh tick"
                    );
                }
                Err(e) => {
                    tracing::debug!(target: "scheduler", error = %e, "refresh run did not complete");
                }
            }
        }
    })
}
