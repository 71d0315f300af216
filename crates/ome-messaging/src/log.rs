// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;

use tokio::sync::RwLock;

use crate::codec::callsigns_match;
use crate::message::{Message, MessageKind};

/// Fixed-capacity FIFO message history (§3/§4.2).
///
/// Appends are O(1); eviction at capacity drops from the head in O(1).
/// Reads (`recent`, `context_window`) take a read lock and return owned
/// copy-on-read slices so callers observe a stable snapshot even while a
/// concurrent append is in flight on another task.
pub struct MessageLog {
    capacity: usize,
    inner: RwLock<VecDeque<Message>>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "MessageLog capacity must be positive");
        Self {
            capacity,
            inner: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, evicting the oldest entry if at capacity (§8
    /// property 2: `|MessageLog| <= H` at all times).
    pub async fn append(&self, message: Message) {
        let mut guard = self.inner.write().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(message);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// The last `n` messages, in log order.
    pub async fn recent(&self, n: usize) -> Vec<Message> {
        let guard = self.inner.read().await;
        let len = guard.len();
        let start = len.saturating_sub(n);
        guard.iter().skip(start).cloned().collect()
    }

    /// All messages currently retained, in log order (used by the Snapshot
    /// Manager — §4.11).
    pub async fn all(&self) -> Vec<Message> {
        self.inner.read().await.iter().cloned().collect()
    }

    /// The last `w` messages visible to `callsign`: sent by it, addressed to
    /// it, broadcasts, or System messages (§3/§8 property 3).
    pub async fn context_window(&self, callsign: &str, w: usize) -> Vec<Message> {
        let guard = self.inner.read().await;
        let mut out: Vec<Message> = guard
            .iter()
            .filter(|m| {
                m.kind == MessageKind::System
                    || m.is_broadcast
                    || callsigns_match(&m.sender, callsign)
                    || m.recipient
                        .as_deref()
                        .is_some_and(|r| callsigns_match(r, callsign))
            })
            .cloned()
            .collect();
        if out.len() > w {
            let drop = out.len() - w;
            out.drain(0..drop);
        }
        out
    }

    /// Replace the entire contents, preserving order — used when restoring
    /// from a snapshot (§4.11). The incoming slice is truncated to the most
    /// recent `capacity` entries if it exceeds the bound.
    pub async fn restore(&self, messages: Vec<Message>) {
        let mut guard = self.inner.write().await;
        guard.clear();
        let start = messages.len().saturating_sub(self.capacity);
        guard.extend(messages.into_iter().skip(start));
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    fn msg(sender: &str, recipient: Option<&str>, broadcast: bool, kind: MessageKind) -> Message {
        Message::new(
            sender,
            recipient.map(String::from),
            "body",
            kind,
            MessageType::Report,
            broadcast,
        )
    }

    #[tokio::test]
    async fn append_respects_capacity_fifo() {
        let log = MessageLog::new(3);
        for i in 0..5 {
            log.append(msg(&format!("S{i}"), None, true, MessageKind::Agent))
                .await;
        }
        assert_eq!(log.len().await, 3);
        let all = log.all().await;
        assert_eq!(all[0].sender, "S2");
        assert_eq!(all[1].sender, "S3");
        assert_eq!(all[2].sender, "S4");
    }

    #[tokio::test]
    async fn recent_returns_last_n_in_order() {
        let log = MessageLog::new(10);
        for i in 0..5 {
            log.append(msg(&format!("S{i}"), None, true, MessageKind::Agent))
                .await;
        }
        let r = log.recent(2).await;
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].sender, "S3");
        assert_eq!(r[1].sender, "S4");
    }

    #[tokio::test]
    async fn recent_n_greater_than_len_returns_all() {
        let log = MessageLog::new(10);
        log.append(msg("S0", None, true, MessageKind::Agent)).await;
        let r = log.recent(50).await;
        assert_eq!(r.len(), 1);
    }

    #[tokio::test]
    async fn context_window_filters_by_sender_recipient_broadcast_system() {
        let log = MessageLog::new(10);
        log.append(msg("ALPHA-ONE", None, false, MessageKind::Agent))
            .await; // from C
        log.append(msg("COMMAND", Some("ALPHA-TWO"), false, MessageKind::User))
            .await; // addressed elsewhere, excluded
        log.append(msg("COMMAND", Some("ALPHA-ONE"), false, MessageKind::User))
            .await; // addressed to C
        log.append(msg("COMMAND", None, true, MessageKind::User))
            .await; // broadcast
        log.append(Message::system("breaker opened")).await; // system

        let window = log.context_window("Alpha One", 10).await;
        assert_eq!(window.len(), 4);
        assert!(window.iter().all(|m| m.sender != "COMMAND" || m.is_broadcast
            || m.recipient.as_deref() == Some("ALPHA-ONE")
            || m.kind == MessageKind::System));
    }

    #[tokio::test]
    async fn context_window_caps_at_w_keeping_most_recent() {
        let log = MessageLog::new(50);
        for i in 0..10 {
            log.append(msg("ALPHA-ONE", None, false, MessageKind::Agent))
                .await;
            let _ = i;
        }
        let window = log.context_window("Alpha One", 3).await;
        assert_eq!(window.len(), 3);
    }

    #[tokio::test]
    async fn restore_truncates_to_capacity_keeping_tail() {
        let log = MessageLog::new(2);
        let messages: Vec<Message> = (0..5)
            .map(|i| msg(&format!("S{i}"), None, true, MessageKind::Agent))
            .collect();
        log.restore(messages).await;
        let all = log.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sender, "S3");
        assert_eq!(all[1].sender, "S4");
    }
}
