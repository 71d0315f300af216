// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Retry Engine (§4.5): exponential backoff with jitter around a fallible
//! async operation. Only retryable error kinds trigger another attempt
//! (§7); everything else propagates on the first failure.
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Exponential backoff tuning (§9 AMBIENT configuration surface).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `k` (1-indexed), per §4.5: `min(max_delay,
    /// initial_delay * base^(k-1))`, then optionally scaled by a uniform
    /// random factor in `[0.5, 1.5]`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        let exponent = (k.saturating_sub(1)) as i32;
        let raw = self.initial_delay.as_secs_f64() * self.base.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let scaled = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Drive `op` with exponential backoff, retrying only while `is_retryable`
/// returns true for the last error and the attempt budget remains.
///
/// `cancel`, when triggered, aborts before the next attempt's sleep (or
/// before the next attempt entirely) rather than mid-flight — the in-flight
/// operation itself is responsible for observing cancellation if it can be
/// aborted earlier (§5).
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        let result = op().await;
        match result {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt >= config.max_attempts || !is_retryable(&e) || cancel.is_cancelled() {
                    return Err(e);
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, "retry.attempt");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(e),
                }
                attempt += 1;
            }
        }
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
