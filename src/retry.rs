//! One bounded retry/backoff policy, parameterized per call site.
//!
//! Delay after the n-th failed attempt is `base_delay * multiplier^(n-1)`,
//! capped at one minute. `max_attempts` counts the first try, so the default
//! policy (3 attempts, 1s, x2) sleeps 1s then 2s before giving up.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::PipelineError;

const MAX_ATTEMPTS_CAP: u32 = 10;
const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            multiplier,
        }
        .sanitized()
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// Clamp into a bounded, well-formed policy (at least one attempt, at most
    /// `MAX_ATTEMPTS_CAP`, non-shrinking multiplier).
    pub fn sanitized(mut self) -> Self {
        self.max_attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS_CAP);
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            self.multiplier = 1.0;
        }
        self
    }

    /// Backoff before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_ATTEMPTS_CAP) as i32;
        let ms = (self.base_delay_ms as f64) * self.multiplier.max(1.0).powi(exp);
        Duration::from_millis(ms as u64).min(MAX_DELAY)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, R>(&self, label: &str, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max = self.max_attempts.clamp(1, MAX_ATTEMPTS_CAP);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max && retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        target: "retry",
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `run` specialised to the pipeline taxonomy: retry transient errors only.
    pub async fn run_transient<T, F, Fut>(&self, label: &str, op: F) -> Result<T, PipelineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        self.run(label, op, PipelineError::is_transient).await
    }
}
