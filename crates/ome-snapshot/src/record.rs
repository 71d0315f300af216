// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The serializable shape of a session (§3 "Session Snapshot"): message
//! log contents in order, each agent's memory, and a config summary.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ome_memory::{Memory, MemoryCategory};
use ome_messaging::Message;
use serde::{Deserialize, Serialize};

/// A flattened, serializable copy of one agent's [`Memory`] (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub cap: usize,
    pub task_list: Vec<String>,
    pub key_facts: HashMap<String, String>,
    pub decisions_made: Vec<String>,
    pub concerns: Vec<String>,
    pub notes: Vec<String>,
}

impl MemorySnapshot {
    pub fn capture(memory: &Memory) -> Self {
        Self {
            cap: memory.cap(),
            task_list: memory.task_list().iter().cloned().collect(),
            key_facts: memory.key_facts().clone(),
            decisions_made: memory.decisions_made().iter().cloned().collect(),
            concerns: memory.concerns().iter().cloned().collect(),
            notes: memory.notes().iter().cloned().collect(),
        }
    }

    /// Rebuild a [`Memory`] by replaying each captured entry through
    /// `apply_update`, in capture order, against a freshly sized scratchpad
    /// — reproducing the original bounded deques entry-for-entry since the
    /// capture never holds more than `cap` items per category.
    pub fn restore(&self) -> Memory {
        let mut memory = Memory::new(self.cap);
        for t in &self.task_list {
            memory.apply_update(MemoryCategory::TaskList, t);
        }
        let mut keys: Vec<&String> = self.key_facts.keys().collect();
        keys.sort();
        for k in keys {
            memory.apply_update(MemoryCategory::KeyFacts, &format!("{k}={}", self.key_facts[k]));
        }
        for d in &self.decisions_made {
            memory.apply_update(MemoryCategory::DecisionsMade, d);
        }
        for c in &self.concerns {
            memory.apply_update(MemoryCategory::Concerns, c);
        }
        for n in &self.notes {
            memory.apply_update(MemoryCategory::Notes, n);
        }
        memory
    }
}

/// One roster entry's identity plus its captured memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub callsign: String,
    pub memory: MemorySnapshot,
}

/// The full durable record for one session (§3, §4.11). Tool-server
/// sessions are deliberately absent — they are re-established on demand
/// after restore, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub agents: Vec<AgentSnapshot>,
    pub config_summary: serde_json::Value,
}

/// The lightweight row returned by `list` (§4.11: "id + createdAt +
/// counts", no full payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub agent_count: usize,
}

/// `export`'s two output shapes (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Structured,
    Text,
}

/// Render a session as a human-readable transcript plus a per-agent memory
/// dump — the `ExportFormat::Text` shape.
pub fn render_text(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Session {} (created {}, updated {})\n\n",
        snapshot.session_id, snapshot.created_at, snapshot.updated_at
    ));
    out.push_str("-- Transcript --\n");
    for m in &snapshot.messages {
        match &m.recipient {
            Some(r) => out.push_str(&format!("[{}] {} -> {}: {}\n", m.created_at, m.sender, r, m.content)),
            None => out.push_str(&format!("[{}] {}: {}\n", m.created_at, m.sender, m.content)),
        }
    }
    for agent in &snapshot.agents {
        out.push_str(&format!("\n-- {} ({}) memory --\n", agent.callsign, agent.agent_id));
        let fragment = agent.memory.restore().render_prompt_fragment();
        if fragment.is_empty() {
            out.push_str("(empty)\n");
        } else {
            out.push_str(&fragment);
        }
    }
    out
}
