//! Run the pipeline once for a topic and print the run as JSON.
//!
//! Usage: trend_once <topic words...>

use anyhow::{bail, Context};
use evolvex_trends::bootstrap::PipelineRuntime;
use evolvex_trends::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let topic = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.trim().is_empty() {
        bail!("usage: trend_once <topic>");
    }

    let rt = PipelineRuntime::load_default()?;
    let run = rt.coordinator.submit(&topic).await?;
    let json = serde_json::to_string_pretty(run.as_ref()).context("encoding run")?;
    println!("{json}");
    Ok(())
}
