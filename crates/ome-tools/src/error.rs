// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Error kinds consumed by the Tool Registry, Tool Client Pool, Retry
//! Engine, and Circuit Breaker (§7). Every variant carries the structured
//! context `{tool_name?, server_name?, cause}` named in §3 AMBIENT as fields,
//! not a loosely-typed side channel.

/// A failure surfaced from `call_tool` (§4.4 invocation contract).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {tool_name}")]
    ToolNotFound { tool_name: String },

    #[error("circuit open for server {server_name}")]
    CircuitOpen { server_name: String },

    #[error("tool call timed out: {tool_name} on {server_name}")]
    ToolTimeout { tool_name: String, server_name: String },

    #[error("tool execution failed: {tool_name} on {server_name}: {cause}")]
    ToolExecutionError {
        tool_name: String,
        server_name: String,
        cause: String,
    },
}

impl ToolError {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::ToolNotFound { tool_name } => tool_name,
            Self::ToolTimeout { tool_name, .. } => tool_name,
            Self::ToolExecutionError { tool_name, .. } => tool_name,
            Self::CircuitOpen { .. } => "",
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        match self {
            Self::CircuitOpen { server_name } => Some(server_name),
            Self::ToolTimeout { server_name, .. } => Some(server_name),
            Self::ToolExecutionError { server_name, .. } => Some(server_name),
            Self::ToolNotFound { .. } => None,
        }
    }

    /// A compact machine-readable tag for this error's kind, used when
    /// rendering it as a tool-result string (§4.7) and in System-message
    /// fault reports (§7).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "ToolNotFound",
            Self::CircuitOpen { .. } => "CircuitOpen",
            Self::ToolTimeout { .. } => "ToolTimeout",
            Self::ToolExecutionError { .. } => "ToolExecutionError",
        }
    }
}

/// Retryability table (§7): `ToolTimeout` and `ToolExecutionError` trigger
/// another attempt through the Retry Engine; everything else propagates
/// immediately. One implementation, shared by the Retry Engine and the
/// Agent Runtime (§7 AMBIENT).
pub fn is_retryable(err: &ToolError) -> bool {
    matches!(err, ToolError::ToolTimeout { .. } | ToolError::ToolExecutionError { .. })
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
