// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Tool Client Pool (§4.4): one long-lived session per tool server,
//! discovery on connect, and the `call_tool` invocation contract wrapping
//! each dispatch in a circuit breaker, an overall timeout, and retry for
//! the retryable error kinds (§7).
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use ome_config::ToolServerConfig;

use crate::breaker::{Admission, BreakerConfig, CircuitBreaker};
use crate::descriptor::ToolDescriptor;
use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::retry::{retry, RetryConfig};
use crate::transport::{RmcpTransport, ToolTransport, TransportResult};

/// Timeouts the pool applies independently of the Retry Engine's own
/// schedule (§4.4/§5).
#[derive(Debug, Clone, Copy)]
pub struct PoolTimeouts {
    pub connect: Duration,
    pub init: Duration,
    pub call: Duration,
}

impl Default for PoolTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            init: Duration::from_secs(10),
            call: Duration::from_secs(30),
        }
    }
}

/// One connected tool server: its transport and its own circuit breaker.
/// Held behind an `Arc` in the pool's session map so `call_tool` can clone
/// the handle out under a brief lock and run admit/call/retry/record
/// against the clone — the map lock itself is never held across an await
/// point (§5: per-server serialization, not a global one).
struct ServerSession {
    transport: Arc<dyn ToolTransport>,
    breaker: Arc<CircuitBreaker>,
}

/// Owns one live session per connected tool server and dispatches
/// `call_tool` invocations against it. Sessions are torn down in reverse
/// registration order on [`ToolClientPool::shutdown`] (§4.4).
pub struct ToolClientPool {
    registry: Arc<ToolRegistry>,
    timeouts: PoolTimeouts,
    retry_config: RetryConfig,
    breaker_config: BreakerConfig,
    sessions: AsyncMutex<HashMap<String, Arc<ServerSession>>>,
    /// Registration order, used to close sessions in reverse order.
    order: AsyncMutex<Vec<String>>,
}

impl ToolClientPool {
    pub fn new(
        registry: Arc<ToolRegistry>,
        timeouts: PoolTimeouts,
        retry_config: RetryConfig,
        breaker_config: BreakerConfig,
    ) -> Self {
        Self {
            registry,
            timeouts,
            retry_config,
            breaker_config,
            sessions: AsyncMutex::new(HashMap::new()),
            order: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Connect to one tool server: spawn the child process, perform the MCP
    /// handshake, discover its tools, and install them into the Registry.
    /// Discovery failures fail the whole connection and any partially
    /// installed descriptors are rolled back (§4.4).
    pub async fn connect(&self, server: &ToolServerConfig) -> Result<usize, ToolError> {
        let mut command = Command::new(&server.command);
        command.args(&server.args);
        for (k, v) in &server.env {
            command.env(k, v);
        }

        let transport = tokio::time::timeout(self.timeouts.connect, async {
            TokioChildProcess::new(command).map_err(|e| e.to_string())
        })
        .await
        .map_err(|_| ToolError::ToolExecutionError {
            tool_name: String::new(),
            server_name: server.name.clone(),
            cause: "connect timed out".to_string(),
        })?
        .map_err(|cause| ToolError::ToolExecutionError {
            tool_name: String::new(),
            server_name: server.name.clone(),
            cause,
        })?;

        let client: rmcp::service::RunningService<RoleClient, ()> =
            tokio::time::timeout(self.timeouts.init, ().serve(transport))
                .await
                .map_err(|_| ToolError::ToolExecutionError {
                    tool_name: String::new(),
                    server_name: server.name.clone(),
                    cause: "mcp initialize timed out".to_string(),
                })?
                .map_err(|e| ToolError::ToolExecutionError {
                    tool_name: String::new(),
                    server_name: server.name.clone(),
                    cause: e.to_string(),
                })?;
        tracing::info!(server_name = %server.name, "mcp.connect");

        let discovered = client
            .list_tools(Default::default())
            .await
            .map_err(|e| ToolError::ToolExecutionError {
                tool_name: String::new(),
                server_name: server.name.clone(),
                cause: format!("list_tools failed: {e}"),
            })?;

        let mut installed = Vec::new();
        for tool in discovered.tools {
            let descriptor = ToolDescriptor::new(
                tool.name.to_string(),
                server.name.clone(),
                tool.description.clone().unwrap_or_default().to_string(),
                Value::Object((*tool.input_schema).clone()),
            );
            if self.registry.install(descriptor) {
                installed.push(tool.name.to_string());
            } else {
                // Roll back only what this connection itself installed; a
                // name collision against an *earlier* server is expected
                // and handled by the registry's own warning, not a failure.
            }
        }

        self.install_session(&server.name, Arc::new(RmcpTransport::new(client))).await;
        Ok(installed.len())
    }

    /// Install a tool server session backed by an already-constructed
    /// [`ToolTransport`] rather than spawning a child process. `connect`
    /// uses this internally for the real `rmcp` transport; it is also how
    /// tests wire a [`crate::transport::MockTransport`] in to exercise the
    /// tool-use loop, retry, and breaker behavior deterministically (§9
    /// AMBIENT design note).
    pub async fn install_session(&self, server_name: &str, transport: Arc<dyn ToolTransport>) {
        let breaker = Arc::new(CircuitBreaker::new(server_name, self.breaker_config));
        self.sessions
            .lock()
            .await
            .insert(server_name.to_string(), Arc::new(ServerSession { transport, breaker }));
        self.order.lock().await.push(server_name.to_string());
    }

    /// The invocation contract (§4.4): resolve, consult the breaker, call
    /// under an overall timeout with retry for retryable kinds, record the
    /// outcome with the breaker. The session handle is cloned out of the
    /// map under a brief lock and the map lock is dropped before admit,
    /// retry, or the RPC itself run — a hung call on one server never
    /// blocks a `CircuitOpen` fast-fail (or anything else) on another
    /// (§5, §8 property 7).
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let Some((server_name, _schema)) = self.registry.lookup(tool_name) else {
            return Err(ToolError::ToolNotFound { tool_name: tool_name.to_string() });
        };

        let session = {
            let sessions = self.sessions.lock().await;
            match sessions.get(&server_name) {
                Some(session) => Arc::clone(session),
                None => {
                    return Err(ToolError::ToolExecutionError {
                        tool_name: tool_name.to_string(),
                        server_name: server_name.clone(),
                        cause: "no live session for server".to_string(),
                    })
                }
            }
        };

        match session.breaker.admit() {
            Admission::Denied => {
                return Err(ToolError::CircuitOpen { server_name: server_name.clone() });
            }
            Admission::Allowed | Admission::AllowedAsProbe => {}
        }

        let args_map = match arguments {
            Value::Object(m) => Some(m),
            Value::Null => None,
            other => {
                let mut m = Map::new();
                m.insert("value".to_string(), other);
                Some(m)
            }
        };

        tracing::info!(tool_name, server_name = %server_name, "tool.call.start");

        let start = std::time::Instant::now();
        let outcome = retry(
            &self.retry_config,
            cancel,
            crate::error::is_retryable,
            || async {
                let call = session.transport.call_tool(tool_name, args_map.clone());
                match tokio::time::timeout(self.timeouts.call, call).await {
                    Ok(TransportResult::Ok { content, is_error }) => {
                        if is_error {
                            Err(ToolError::ToolExecutionError {
                                tool_name: tool_name.to_string(),
                                server_name: server_name.clone(),
                                cause: content,
                            })
                        } else {
                            Ok(content)
                        }
                    }
                    Ok(TransportResult::Timeout) => Err(ToolError::ToolTimeout {
                        tool_name: tool_name.to_string(),
                        server_name: server_name.clone(),
                    }),
                    Ok(TransportResult::Failed(cause)) => Err(ToolError::ToolExecutionError {
                        tool_name: tool_name.to_string(),
                        server_name: server_name.clone(),
                        cause,
                    }),
                    Err(_) => Err(ToolError::ToolTimeout {
                        tool_name: tool_name.to_string(),
                        server_name: server_name.clone(),
                    }),
                }
            },
        )
        .await;

        let duration_ms = start.elapsed().as_millis();
        match &outcome {
            Ok(_) => {
                session.breaker.record_success();
                tracing::info!(tool_name, server_name = %server_name, duration_ms, outcome = "success", "tool.call.end");
            }
            Err(e) => {
                session.breaker.record_failure();
                tracing::warn!(tool_name, server_name = %server_name, duration_ms, outcome = %e.kind_tag(), "tool.call.end");
            }
        }
        outcome
    }

    /// Close every session in reverse registration order (§4.4). Safe to
    /// call more than once — a second call observes an already-empty order
    /// list and is a no-op (§8 property 12).
    pub async fn shutdown(&self) {
        let mut order = self.order.lock().await;
        let mut sessions = self.sessions.lock().await;
        while let Some(name) = order.pop() {
            if let Some(session) = sessions.remove(&name) {
                self.registry.remove_server(&name);
                if let Err(e) = session.transport.close().await {
                    tracing::warn!(server_name = %name, error = %e, "error closing tool server session");
                }
            }
        }
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
