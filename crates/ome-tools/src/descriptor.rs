// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

/// One tool published by a tool server, as surfaced by its `list_tools`
/// discovery call (§3/§6).
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub tool_name: String,
    pub server_name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        tool_name: impl Into<String>,
        server_name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            server_name: server_name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
