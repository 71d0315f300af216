// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Per-server tool invocation (§4.4), extracted behind a trait so the
//! [`crate::ToolClientPool`] can be driven by an injected mock session in
//! tests (§9 AMBIENT design note: "unit tests must inject replacements —
//! mock tool client, mock LLM") instead of only the real `rmcp` child
//! process transport.
use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::RoleClient;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

/// The raw, unclassified result of one tool invocation, before
/// [`crate::ToolClientPool::call_tool`] maps it onto a [`crate::ToolError`]
/// (§4.4 invocation contract steps 4-6).
#[derive(Debug, Clone)]
pub enum TransportResult {
    Ok { content: String, is_error: bool },
    Timeout,
    Failed(String),
}

/// One live connection to a tool server. [`RmcpTransport`] implements this
/// over a real MCP child-process session; `MockTransport` drives the same
/// seam from a scripted, in-process sequence for tests that need to
/// exercise the tool-use loop, the breaker, or the retry engine without a
/// real server.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call_tool(&self, tool_name: &str, arguments: Option<Map<String, Value>>) -> TransportResult;

    /// Best-effort close, called once per session in reverse registration
    /// order on [`crate::ToolClientPool::shutdown`]. Idempotent.
    async fn close(&self) -> Result<(), String>;
}

/// The real transport: one `rmcp` client session over a child-process
/// stdio transport. The session is held behind its own mutex so `close`
/// can take ownership to call `RunningService::cancel` (which consumes
/// `self`) without requiring exclusive ownership of the `ToolTransport`
/// trait object itself; a held lock here serializes calls to this one
/// server, matching §5's "serialized per server (single in-flight RPC)."
pub struct RmcpTransport {
    client: AsyncMutex<Option<RunningService<RoleClient, ()>>>,
}

impl RmcpTransport {
    pub fn new(client: RunningService<RoleClient, ()>) -> Self {
        Self { client: AsyncMutex::new(Some(client)) }
    }
}

#[async_trait]
impl ToolTransport for RmcpTransport {
    async fn call_tool(&self, tool_name: &str, arguments: Option<Map<String, Value>>) -> TransportResult {
        let guard = self.client.lock().await;
        let Some(client) = guard.as_ref() else {
            return TransportResult::Failed("tool server session already closed".to_string());
        };
        let call = client.call_tool(CallToolRequestParam { name: Cow::Owned(tool_name.to_string()), arguments });
        match call.await {
            Ok(result) => TransportResult::Ok {
                content: stringify_content(&result.content),
                is_error: result.is_error.unwrap_or(false),
            },
            Err(e) => TransportResult::Failed(e.to_string()),
        }
    }

    async fn close(&self) -> Result<(), String> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.take() {
            client.cancel().await.map(|_| ()).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

fn stringify_content(content: &[rmcp::model::Content]) -> String {
    content.iter().filter_map(|c| c.as_text().map(|t| t.text.clone())).collect::<Vec<_>>().join("\n")
}

/// A deterministic, in-process [`ToolTransport`] for tests. Calls pop a
/// scripted result in order; once the script is exhausted, the last
/// entry repeats. Every call is recorded for assertions on arguments and
/// call count.
pub struct MockTransport {
    script: std::sync::Mutex<Vec<TransportResult>>,
    calls: std::sync::Mutex<Vec<(String, Option<Map<String, Value>>)>>,
    delay: Option<std::time::Duration>,
}

impl MockTransport {
    /// Every call returns the same result.
    pub fn always(result: TransportResult) -> Self {
        Self::scripted(vec![result])
    }

    /// Calls pop `results` in order; the last entry repeats once the
    /// script is exhausted.
    pub fn scripted(results: Vec<TransportResult>) -> Self {
        Self {
            script: std::sync::Mutex::new(results),
            calls: std::sync::Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep `delay` before resolving every call — for tests asserting
    /// that a slow server doesn't block sibling servers (§5).
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock transport lock poisoned").len()
    }
}

#[async_trait]
impl ToolTransport for MockTransport {
    async fn call_tool(&self, tool_name: &str, arguments: Option<Map<String, Value>>) -> TransportResult {
        self.calls
            .lock()
            .expect("mock transport lock poisoned")
            .push((tool_name.to_string(), arguments));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().expect("mock transport lock poisoned");
        match script.len() {
            0 => TransportResult::Ok { content: String::new(), is_error: false },
            1 => script[0].clone(),
            _ => script.remove(0),
        }
    }

    async fn close(&self) -> Result<(), String> {
        Ok(())
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_repeats_last_entry_after_script_exhausted() {
        let mock = MockTransport::scripted(vec![
            TransportResult::Failed("boom".into()),
            TransportResult::Ok { content: "done".into(), is_error: false },
        ]);
        assert!(matches!(mock.call_tool("t", None).await, TransportResult::Failed(_)));
        assert!(matches!(mock.call_tool("t", None).await, TransportResult::Ok { .. }));
        assert!(matches!(mock.call_tool("t", None).await, TransportResult::Ok { .. }));
        assert_eq!(mock.call_count(), 3);
    }
}
