// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Facade crate wiring an [`ome_config::OmeConfig`] into a running
//! session: the agent roster, the shared tool federation, the
//! [`Orchestrator`], and (optionally) a [`SnapshotManager`]. An embedding
//! front-end constructs one [`OmeSession`] and drives it one transmission
//! at a time — loading a config file, choosing concrete `ModelProvider`
//! implementations, and presenting a UI are all its responsibility, not
//! this crate's.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use ome_config::OmeConfig;
pub use ome_core::{AgentError, AgentRuntime};
pub use ome_messaging::{MessageLog, ParsedMessage};
pub use ome_model::ModelProvider;
pub use ome_orchestrator::{Orchestrator, Utterance};
pub use ome_snapshot::{ExportFormat, SessionSnapshot, SnapshotError, SnapshotManager, SnapshotSummary};
pub use ome_tools::ToolError;
use ome_tools::{PoolTimeouts, ToolClientPool, ToolRegistry};
use tokio_util::sync::CancellationToken;

/// Scratchpad size used for every agent's [`ome_memory::Memory`] (§4.3:
/// "cap >= 20"). Not yet exposed as a per-agent config knob — every agent
/// in a roster gets the same bound.
const AGENT_MEMORY_CAP: usize = 20;

/// A fully wired, runnable OME session: roster, message log, tool
/// federation, and turn scheduler.
pub struct OmeSession {
    config: OmeConfig,
    log: Arc<MessageLog>,
    agents: Vec<Arc<AgentRuntime>>,
    tool_pool: Option<Arc<ToolClientPool>>,
    orchestrator: Orchestrator,
    snapshots: Option<Arc<SnapshotManager>>,
}

impl OmeSession {
    /// Validate `config`, connect every configured tool server, build one
    /// [`AgentRuntime`] per roster entry bound to the `ModelProvider` the
    /// caller supplies for it (keyed by `agent_id`), and assemble the
    /// [`Orchestrator`]. `snapshots` is optional — a session with none
    /// simply cannot `save`/`load`.
    pub async fn start(
        config: OmeConfig,
        models: HashMap<String, Arc<dyn ModelProvider>>,
        snapshots: Option<Arc<SnapshotManager>>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid OME configuration")?;

        let tool_pool = if config.tool_servers.is_empty() {
            None
        } else {
            let registry = Arc::new(ToolRegistry::new());
            let timeouts = PoolTimeouts {
                connect: Duration::from_secs(config.orchestration.tool_connect_timeout_s),
                init: Duration::from_secs(config.orchestration.tool_init_timeout_s),
                call: Duration::from_secs(config.orchestration.tool_timeout_s),
            };
            let pool = Arc::new(ToolClientPool::new(
                registry,
                timeouts,
                config.orchestration.retry.clone(),
                config.orchestration.breaker.clone(),
            ));
            for server in &config.tool_servers {
                let installed = pool
                    .connect(server)
                    .await
                    .with_context(|| format!("connecting tool server {}", server.name))?;
                tracing::info!(server_name = %server.name, tools_installed = installed, "tool server connected");
            }
            Some(pool)
        };

        let mut agents = Vec::with_capacity(config.roster.len());
        for entry in &config.roster {
            let model = models
                .get(&entry.agent_id)
                .cloned()
                .with_context(|| format!("no ModelProvider supplied for agent_id {}", entry.agent_id))?;
            let criteria = ome_core::compile_speaking_criteria(&entry.speaking_criteria);
            agents.push(Arc::new(AgentRuntime::new(
                entry.agent_id.clone(),
                entry.callsign.clone(),
                entry.role,
                entry.model.clone(),
                entry.base_prompt.clone(),
                criteria,
                model,
                tool_pool.clone(),
                AGENT_MEMORY_CAP,
            )));
        }

        let log = Arc::new(MessageLog::new(config.orchestration.max_history));
        let orchestrator = Orchestrator::new(Arc::clone(&log), agents.clone(), config.orchestration.clone());

        Ok(Self { config, log, agents, tool_pool, orchestrator, snapshots })
    }

    pub fn config(&self) -> &OmeConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    pub fn agents(&self) -> &[Arc<AgentRuntime>] {
        &self.agents
    }

    /// Append one externally-originated transmission and run whichever
    /// agent(s) it provokes to speak (§4.10).
    pub async fn handle_message(&self, content: impl Into<String>, cancel: &CancellationToken) -> Vec<Utterance> {
        self.orchestrator.handle_message(content, cancel).await
    }

    /// Upsert the current session state under `session_id` (§4.11 `save`).
    pub async fn save_snapshot(&self, session_id: &str, config_summary: serde_json::Value) -> anyhow::Result<()> {
        let manager = self.snapshots.as_ref().context("no SnapshotManager configured for this session")?;
        manager.save(session_id, &self.log, &self.agents, config_summary).await?;
        Ok(())
    }

    /// Replace this session's message log and every matching agent's
    /// memory with what was saved under `session_id` (§4.11 `load` +
    /// restore). Tool-server sessions are left untouched — they are
    /// already live, or will be re-established on the next `start`.
    pub async fn load_snapshot(&self, session_id: &str) -> anyhow::Result<()> {
        let manager = self.snapshots.as_ref().context("no SnapshotManager configured for this session")?;
        let snapshot = manager.load(session_id).await?;
        SnapshotManager::restore_into(&snapshot, &self.log, &self.agents).await;
        Ok(())
    }

    pub async fn list_snapshots(&self, limit: usize, offset: usize) -> anyhow::Result<Vec<SnapshotSummary>> {
        let manager = self.snapshots.as_ref().context("no SnapshotManager configured for this session")?;
        Ok(manager.list(limit, offset).await?)
    }

    pub async fn delete_snapshot(&self, session_id: &str) -> anyhow::Result<()> {
        let manager = self.snapshots.as_ref().context("no SnapshotManager configured for this session")?;
        manager.delete(session_id).await?;
        Ok(())
    }

    pub async fn export_snapshot(&self, session_id: &str, format: ExportFormat) -> anyhow::Result<String> {
        let manager = self.snapshots.as_ref().context("no SnapshotManager configured for this session")?;
        Ok(manager.export(session_id, format).await?)
    }

    /// Tear down every live tool-server session. Idempotent; safe to call
    /// during shutdown even if no tool servers were ever configured.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.tool_pool {
            pool.shutdown().await;
        }
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
