// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Snapshot Manager (§4.11): durable session persistence backed by
//! `rusqlite`, keyed by `session_id`.
mod error;
mod record;
mod store;

pub use error::SnapshotError;
pub use record::{render_text, AgentSnapshot, ExportFormat, MemorySnapshot, SessionSnapshot, SnapshotSummary};
pub use store::SnapshotManager;

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ome_config::{AgentRole, ModelParams};
    use ome_core::AgentRuntime;
    use ome_messaging::{Message, MessageKind, MessageLog, MessageType};
    use ome_model::{ModelProvider, ScriptedMockProvider};
    use serde_json::json;

    use super::*;

    fn agent(id: &str, callsign: &str) -> Arc<AgentRuntime> {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("ack"));
        Arc::new(AgentRuntime::new(
            id,
            callsign,
            AgentRole::Specialist,
            ModelParams::default(),
            "you are an agent",
            vec![],
            model,
            None,
            20,
        ))
    }

    #[tokio::test]
    async fn save_then_load_round_trips_messages_and_memory() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let log = MessageLog::new(100);
        log.append(Message::new(
            "COMMAND",
            None,
            "status report",
            MessageKind::User,
            MessageType::Report,
            true,
        ))
        .await;
        let alpha = agent("a1", "Alpha One");
        alpha.restore_memory(ome_memory::Memory::new(20)).await;
        {
            let mut m = ome_memory::Memory::new(20);
            m.apply_update(ome_memory::MemoryCategory::TaskList, "verify KBOS weather");
            alpha.restore_memory(m).await;
        }

        manager.save("m1", &log, &[alpha.clone()], json!({"roster_size": 1})).await.unwrap();
        let loaded = manager.load("m1").await.unwrap();

        assert_eq!(loaded.session_id, "m1");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.agents.len(), 1);
        assert_eq!(loaded.agents[0].memory.task_list, vec!["verify KBOS weather".to_string()]);
        assert_eq!(loaded.config_summary, json!({"roster_size": 1}));
    }

    #[tokio::test]
    async fn save_twice_preserves_created_at_and_advances_updated_at() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let log = MessageLog::new(100);
        let alpha = agent("a1", "Alpha One");

        manager.save("m1", &log, &[alpha.clone()], json!({})).await.unwrap();
        let first = manager.load("m1").await.unwrap();
        manager.save("m1", &log, &[alpha], json!({})).await.unwrap();
        let second = manager.load("m1").await.unwrap();

        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn load_unknown_session_is_not_found() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let err = manager.load("missing").await.unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_unknown_session_is_not_found() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let err = manager.delete("missing").await.unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_orders_by_most_recently_updated_first() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let log = MessageLog::new(100);
        manager.save("m1", &log, &[], json!({})).await.unwrap();
        manager.save("m2", &log, &[], json!({})).await.unwrap();
        let rows = manager.list(10, 0).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].session_id, "m2");
    }

    #[tokio::test]
    async fn restore_into_replays_log_and_memory_onto_live_state() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let log = MessageLog::new(100);
        log.append(Message::system("breaker opened")).await;
        let alpha = agent("a1", "Alpha One");
        {
            let mut m = ome_memory::Memory::new(20);
            m.apply_update(ome_memory::MemoryCategory::Notes, "weather looks clear");
            alpha.restore_memory(m).await;
        }
        manager.save("m1", &log, &[alpha.clone()], json!({})).await.unwrap();
        let snapshot = manager.load("m1").await.unwrap();

        let fresh_log = MessageLog::new(100);
        let fresh_alpha = agent("a1", "Alpha One");
        SnapshotManager::restore_into(&snapshot, &fresh_log, &[fresh_alpha.clone()]).await;

        assert_eq!(fresh_log.len().await, 1);
        assert_eq!(fresh_alpha.snapshot_memory().await.notes().len(), 1);
    }

    #[tokio::test]
    async fn export_text_includes_transcript_and_memory() {
        let manager = SnapshotManager::open_in_memory().unwrap();
        let log = MessageLog::new(100);
        log.append(Message::new("COMMAND", None, "status", MessageKind::User, MessageType::Report, true))
            .await;
        let alpha = agent("a1", "Alpha One");
        manager.save("m1", &log, &[alpha], json!({})).await.unwrap();

        let text = manager.export("m1", ExportFormat::Text).await.unwrap();
        assert!(text.contains("COMMAND"));
        assert!(text.contains("Alpha One"));

        let structured = manager.export("m1", ExportFormat::Structured).await.unwrap();
        assert!(structured.contains("\"session_id\""));
    }
}
