// src/metrics.rs
//! Prometheus recorder for the service binary. The handle is passed into
//! `api::AppState`, which mounts `/metrics` when one is present.

use anyhow::Context;
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// refresh interval as a static gauge.
    pub fn init(refresh_interval_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        gauge!("pipeline_refresh_interval_secs").set(refresh_interval_secs as f64);

        Ok(Self { handle })
    }
}
