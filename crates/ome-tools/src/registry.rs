// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Tool Registry (§4.4): aggregates [`ToolDescriptor`]s installed by the
//! [`crate::ToolClientPool`] during server connection and resolves
//! `tool_name -> server_name` for dispatch.
use std::collections::HashMap;
use std::sync::RwLock;

use crate::descriptor::ToolDescriptor;

/// Central, federation-wide registry of tools. `tool_name` is unique across
/// the federation (§3); a collision resolves to the first-registered entry
/// and logs a warning rather than erroring, so one misbehaving server cannot
/// take down discovery for the rest.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolDescriptor>>,
    /// Preserves registration order so `list_all` is deterministic, matching
    /// the ordering guarantee the Orchestrator relies on for reported output.
    order: RwLock<Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install one descriptor. Returns `false` (and logs a warning) when
    /// `tool_name` already exists — the existing entry is kept.
    pub fn install(&self, descriptor: ToolDescriptor) -> bool {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.contains_key(&descriptor.tool_name) {
            tracing::warn!(
                tool_name = %descriptor.tool_name,
                incoming_server = %descriptor.server_name,
                "duplicate tool_name across tool servers, keeping first-registered"
            );
            return false;
        }
        self.order
            .write()
            .expect("tool registry lock poisoned")
            .push(descriptor.tool_name.clone());
        tools.insert(descriptor.tool_name.clone(), descriptor);
        true
    }

    /// Remove every descriptor previously installed for `server_name` — used
    /// to roll back a partial installation (§4.4) or on session shutdown.
    pub fn remove_server(&self, server_name: &str) {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        let mut order = self.order.write().expect("tool registry lock poisoned");
        tools.retain(|_, d| d.server_name != server_name);
        order.retain(|name| tools.contains_key(name));
    }

    /// All installed descriptors, in registration order.
    pub fn list_all(&self) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let order = self.order.read().expect("tool registry lock poisoned");
        order.iter().filter_map(|name| tools.get(name).cloned()).collect()
    }

    /// Resolve `tool_name` to its owning server and input schema.
    pub fn lookup(&self, tool_name: &str) -> Option<(String, serde_json::Value)> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools
            .get(tool_name)
            .map(|d| (d.server_name.clone(), d.input_schema.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().expect("tool registry lock poisoned").is_empty()
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
