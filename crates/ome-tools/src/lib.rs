// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Tool federation plumbing (§4.4-§4.6): the Tool Registry, the Tool Client
//! Pool that speaks MCP to each tool server, and the Retry Engine / Circuit
//! Breaker that guard every dispatch.
mod breaker;
mod descriptor;
mod error;
mod pool;
mod registry;
mod retry;
mod transport;

pub use breaker::{Admission, BreakerConfig, BreakerState, BreakerStats, CircuitBreaker};
pub use descriptor::ToolDescriptor;
pub use error::{is_retryable, ToolError};
pub use pool::{PoolTimeouts, ToolClientPool};
pub use registry::ToolRegistry;
pub use retry::{retry, RetryConfig};
pub use transport::{MockTransport, RmcpTransport, ToolTransport, TransportResult};
