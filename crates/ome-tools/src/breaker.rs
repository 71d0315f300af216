// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Circuit Breaker (§4.6): one per tool server, CLOSED/OPEN/HALF_OPEN state
//! machine guarded by a single mutex so every read and write appears atomic
//! to external observers (§8 property 7).
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker state (§3 `CircuitBreakerState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Tuning thresholds for one breaker instance (§9 AMBIENT configuration
/// surface).
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Observability snapshot (§6: `breaker.state_change`, `stats()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    /// At most one probe call is in flight while HALF_OPEN (§4.6).
    probe_in_flight: bool,
}

/// Per-tool-server circuit breaker. No retry lives here — retry composes
/// externally via [`crate::retry`] so that an OPEN breaker fails immediately
/// and only timeouts/execution errors are retried (§4.6).
pub struct CircuitBreaker {
    server_name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

/// Whether a call may proceed, and — for HALF_OPEN — whether it is the one
/// permitted probe.
pub enum Admission {
    Allowed,
    AllowedAsProbe,
    Denied,
}

impl CircuitBreaker {
    pub fn new(server_name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            server_name: server_name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Decide whether a call may proceed right now, transitioning OPEN ->
    /// HALF_OPEN when the recovery timeout has elapsed (§4.6).
    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.recovery_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                    inner.probe_in_flight = true;
                    tracing::info!(server = %self.server_name, "breaker.state_change open->half_open");
                    Admission::AllowedAsProbe
                } else {
                    Admission::Denied
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Denied
                } else {
                    inner.probe_in_flight = true;
                    Admission::AllowedAsProbe
                }
            }
        }
    }

    /// Record a successful call (§4.6).
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!(server = %self.server_name, "breaker.state_change half_open->closed");
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call (§4.6).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.last_failure_time = Some(Instant::now());
                    tracing::warn!(server = %self.server_name, "breaker.state_change closed->open");
                }
            }
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.state = BreakerState::Open;
                inner.last_failure_time = Some(Instant::now());
                inner.success_count = 0;
                tracing::warn!(server = %self.server_name, "breaker.state_change half_open->open");
            }
            BreakerState::Open => {
                inner.last_failure_time = Some(Instant::now());
            }
        }
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
