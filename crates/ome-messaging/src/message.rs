// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a [`Message`] originated from, distinct from voice-net addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Agent,
    System,
}

/// Classification of a message body, assigned by the Voice-Net Codec
/// (see [`crate::codec`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Acknowledgment,
    Query,
    Command,
    Request,
    Report,
}

/// An immutable entry in the [`crate::MessageLog`].
///
/// Once appended, a `Message` is never mutated — `id` is assigned at
/// construction and is collision-free across concurrent creation because it
/// is a v4 UUID (§8 property 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub sender: String,
    pub recipient: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub message_type: MessageType,
    pub is_broadcast: bool,
}

impl Message {
    /// Construct a new message, stamping a fresh id and timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sender: impl Into<String>,
        recipient: Option<String>,
        content: impl Into<String>,
        kind: MessageKind,
        message_type: MessageType,
        is_broadcast: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sender: sender.into(),
            recipient,
            content: content.into(),
            kind,
            message_type,
            is_broadcast,
        }
    }

    /// Convenience constructor for a System notice (error reports, state
    /// changes) — always broadcast-visible, never addressed.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("SYSTEM", None, content, MessageKind::System, MessageType::Report, true)
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_stamps_unique_ids() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let m = Message::new(
                "A",
                None,
                "hi",
                MessageKind::Agent,
                MessageType::Report,
                false,
            );
            assert!(ids.insert(m.id), "duplicate id generated");
        }
    }

    #[test]
    fn system_message_is_broadcast_and_system_kind() {
        let m = Message::system("breaker opened");
        assert_eq!(m.kind, MessageKind::System);
        assert!(m.is_broadcast);
        assert!(m.recipient.is_none());
    }
}
