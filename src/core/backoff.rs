//! Exponential backoff around the remote classification call.
//!
//! Only [`ClassifyError::ConnectionLost`] is retried. Every other error reaches the caller
//! on first occurrence. Retrying stops once the time spent since the first attempt reaches
//! [`BackoffPolicy::max_elapsed`]; the last connection error is then returned as is.

use crate::core::{Classify, ClassificationRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Wait before the first retry
    pub initial_interval: Duration,
    /// Growth factor between consecutive waits
    pub multiplier: f64,
    /// Time budget measured from the first attempt
    pub max_elapsed: Duration,
    /// Extra random wait, as a fraction of the computed delay (0.0 disables)
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(300),
            jitter_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Wait that follows the `attempt`-th failure (1-based), before budget truncation.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);

        if self.jitter_factor > 0.0 {
            secs *= 1.0 + rand::rng().random_range(0.0..self.jitter_factor);
        }

        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error, or the
    /// elapsed-time budget is spent.
    pub async fn retry<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            attempt,
                            elapsed_secs = start.elapsed().as_secs_f64(),
                            "{} succeeded after retrying",
                            operation_name
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            let elapsed = start.elapsed();
            if elapsed >= self.max_elapsed {
                tracing::error!(
                    attempt,
                    elapsed_secs = elapsed.as_secs_f64(),
                    error = %error,
                    "Giving up {} after {:?}",
                    operation_name,
                    self.max_elapsed
                );
                return Err(error);
            }

            let wait = self.delay_for(attempt).min(self.max_elapsed - elapsed);
            tracing::warn!(
                attempt,
                elapsed_secs = elapsed.as_secs_f64(),
                wait_secs = wait.as_secs_f64(),
                error = %error,
                "Backing off {}",
                operation_name
            );
            sleep(wait).await;
        }
    }
}

/// A [`Classify`] implementation that retries its inner classifier on lost connections.
///
/// The policy is fixed when the wrapper is built; there is no per-call override.
pub struct Resilient<C> {
    inner: C,
    policy: BackoffPolicy,
}

impl<C: Classify> Resilient<C> {
    pub fn new(inner: C, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Classify> Classify for Resilient<C> {
    async fn classify(&self, light_curves: &[ClassificationRequest]) -> Result<serde_json::Value> {
        let inner = &self.inner;
        self.policy
            .retry("classify", move || inner.classify(light_curves))
            .await
    }
}
