// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `SnapshotManager` (§4.11): a `rusqlite`-backed key/value store keyed by
//! `session_id`, one row per session, upsert/load/list/delete/export.
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use ome_core::AgentRuntime;
use ome_messaging::MessageLog;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::SnapshotError;
use crate::record::{AgentSnapshot, ExportFormat, MemorySnapshot, SessionSnapshot, SnapshotSummary};

fn parse_rfc3339(raw: &str) -> Result<chrono::DateTime<Utc>, SnapshotError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SnapshotError::Storage(e.to_string()))
}

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    payload    TEXT NOT NULL
)";

/// Everything but `session_id`/`created_at`/`updated_at`, serialized as one
/// JSON blob in the `payload` column.
#[derive(serde::Serialize, serde::Deserialize)]
struct Payload {
    messages: Vec<ome_messaging::Message>,
    agents: Vec<AgentSnapshot>,
    config_summary: serde_json::Value,
}

/// Durable session store. Writes are serialized behind a single
/// `tokio::sync::Mutex` around the connection (§5: "standard transactional
/// KV semantics; no cross-row transactions required" — one connection is
/// sufficient, concurrent writers to the same session are last-writer-wins
/// by virtue of the mutex ordering their upserts).
pub struct SnapshotManager {
    conn: AsyncMutex<Connection>,
}

impl SnapshotManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let conn = Connection::open(path)?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn: AsyncMutex::new(conn) })
    }

    /// An in-process store with no backing file — useful for tests and for
    /// a front-end that opts out of durability.
    pub fn open_in_memory() -> Result<Self, SnapshotError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn: AsyncMutex::new(conn) })
    }

    /// Upsert the current state of `log` and `agents` under `session_id`
    /// (§4.11 `save`). `created_at` is preserved across an update;
    /// `updated_at` always advances to now.
    pub async fn save(
        &self,
        session_id: &str,
        log: &MessageLog,
        agents: &[Arc<AgentRuntime>],
        config_summary: serde_json::Value,
    ) -> Result<(), SnapshotError> {
        let messages = log.all().await;
        let mut agent_snapshots = Vec::with_capacity(agents.len());
        for agent in agents {
            agent_snapshots.push(AgentSnapshot {
                agent_id: agent.agent_id.clone(),
                callsign: agent.callsign.clone(),
                memory: MemorySnapshot::capture(&agent.snapshot_memory().await),
            });
        }
        let payload = Payload { messages, agents: agent_snapshots, config_summary };
        let payload_json = serde_json::to_string(&payload)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().await;
        let existing_created_at: Option<String> = conn
            .query_row("SELECT created_at FROM sessions WHERE session_id = ?1", params![session_id], |row| row.get(0))
            .optional()?;
        let created_at = existing_created_at.unwrap_or_else(|| now.clone());

        conn.execute(
            "INSERT INTO sessions (session_id, created_at, updated_at, payload) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET updated_at = excluded.updated_at, payload = excluded.payload",
            params![session_id, created_at, now, payload_json],
        )?;
        tracing::info!(session_id, "session.save");
        Ok(())
    }

    /// Load the full document for `session_id` (§4.11 `load`).
    pub async fn load(&self, session_id: &str) -> Result<SessionSnapshot, SnapshotError> {
        let conn = self.conn.lock().await;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT created_at, updated_at, payload FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (created_at, updated_at, payload_json) = row.ok_or_else(|| SnapshotError::NotFound(session_id.to_string()))?;
        let payload: Payload = serde_json::from_str(&payload_json)?;
        tracing::info!(session_id, "session.load");
        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
            messages: payload.messages,
            agents: payload.agents,
            config_summary: payload.config_summary,
        })
    }

    /// Restore `snapshot` onto a live `log` and roster: replaces the
    /// message log wholesale and each matching agent's memory. Agents in
    /// the snapshot with no corresponding live `AgentRuntime` (roster
    /// changed since save) are skipped with a warning; tool-server
    /// sessions are never touched here (§4.11: re-established on demand).
    pub async fn restore_into(snapshot: &SessionSnapshot, log: &MessageLog, agents: &[Arc<AgentRuntime>]) {
        log.restore(snapshot.messages.clone()).await;
        for saved in &snapshot.agents {
            match agents.iter().find(|a| a.agent_id == saved.agent_id) {
                Some(agent) => agent.restore_memory(saved.memory.restore()).await,
                None => tracing::warn!(agent_id = %saved.agent_id, "snapshot references an agent absent from the live roster, skipped"),
            }
        }
    }

    /// Ordered listing (most recently updated first) for a session
    /// browser (§4.11 `list`).
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>, SnapshotError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT session_id, created_at, updated_at, payload FROM sessions ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            let session_id: String = row.get(0)?;
            let created_at: String = row.get(1)?;
            let updated_at: String = row.get(2)?;
            let payload_json: String = row.get(3)?;
            Ok((session_id, created_at, updated_at, payload_json))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (session_id, created_at, updated_at, payload_json) = row?;
            let payload: Payload = serde_json::from_str(&payload_json)?;
            out.push(SnapshotSummary {
                session_id,
                created_at: parse_rfc3339(&created_at)?,
                updated_at: parse_rfc3339(&updated_at)?,
                message_count: payload.messages.len(),
                agent_count: payload.agents.len(),
            });
        }
        Ok(out)
    }

    /// Delete `session_id` (§4.11 `delete`). Errors with `NotFound` if no
    /// such session existed.
    pub async fn delete(&self, session_id: &str) -> Result<(), SnapshotError> {
        let conn = self.conn.lock().await;
        let affected = conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        if affected == 0 {
            return Err(SnapshotError::NotFound(session_id.to_string()));
        }
        tracing::info!(session_id, "snapshot.deleted");
        Ok(())
    }

    /// Serialize a session for external consumption, either as the raw
    /// structured document or a human-readable transcript (§4.11 `export`).
    pub async fn export(&self, session_id: &str, format: ExportFormat) -> Result<String, SnapshotError> {
        let snapshot = self.load(session_id).await?;
        match format {
            ExportFormat::Structured => Ok(serde_json::to_string_pretty(&snapshot)?),
            ExportFormat::Text => Ok(crate::record::render_text(&snapshot)),
        }
    }
}
