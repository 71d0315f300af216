// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Accumulates one streamed [`ome_model::ResponseEvent`] sequence into a
//! single [`AgentReply`] the tool-use loop can act on (§4.7/§6 AMBIENT).
use std::collections::HashMap;

use futures::StreamExt;

use ome_model::{ResponseEvent, ResponseStream};

/// One tool call the model requested in its reply, fully reassembled from
/// whatever sequence of streamed deltas carried it.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, as streamed — not yet parsed.
    pub arguments: String,
}

/// The full text and tool-call requests accumulated from one `complete`
/// stream.
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub had_tool_calls: bool,
}

impl AgentReply {
    pub fn empty() -> Self {
        Self::default()
    }
}

struct Pending {
    id: String,
    name: String,
    args_buf: String,
}

/// Drain `stream` to completion, reassembling parallel tool calls by their
/// provider-assigned `index` (some providers interleave argument deltas for
/// several tool calls within one reply) and returning them in index order —
/// the order the tool-use loop pushes them and, crucially, the order its
/// results are pushed back, not completion order (§9 open question).
pub async fn accumulate_stream(mut stream: ResponseStream) -> anyhow::Result<AgentReply> {
    let mut text = String::new();
    let mut pending: HashMap<u32, Pending> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(delta) => text.push_str(&delta),
            ResponseEvent::ToolCall { index, id, name, arguments } => {
                let p = pending.entry(index).or_insert_with(|| Pending {
                    id: String::new(),
                    name: String::new(),
                    args_buf: String::new(),
                });
                if !id.is_empty() {
                    p.id = id;
                }
                if !name.is_empty() {
                    p.name = name;
                }
                p.args_buf.push_str(&arguments);
            }
            ResponseEvent::Usage { input_tokens, output_tokens } => {
                tracing::debug!(input_tokens, output_tokens, "agent.turn.usage");
            }
            ResponseEvent::Done => break,
            ResponseEvent::Error(e) => {
                tracing::warn!(error = %e, "model stream error");
            }
        }
    }

    let mut ordered: Vec<(u32, Pending)> = pending.into_iter().collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    let mut tool_calls = Vec::with_capacity(ordered.len());
    for (_, p) in ordered {
        if p.name.is_empty() {
            tracing::warn!(tool_call_id = %p.id, "dropping tool call with empty name from model");
            continue;
        }
        let id = if p.id.is_empty() {
            format!("call_{}", tool_calls.len())
        } else {
            p.id
        };
        tool_calls.push(ToolCallRequest { id, name: p.name, arguments: p.args_buf });
    }

    let had_tool_calls = !tool_calls.is_empty();
    Ok(AgentReply { text, tool_calls, had_tool_calls })
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn boxed(events: Vec<anyhow::Result<ResponseEvent>>) -> ResponseStream {
        Box::pin(stream::iter(events))
    }

    #[tokio::test]
    async fn accumulates_plain_text_reply() {
        let s = boxed(vec![
            Ok(ResponseEvent::TextDelta("hello ".into())),
            Ok(ResponseEvent::TextDelta("world".into())),
            Ok(ResponseEvent::Done),
        ]);
        let reply = accumulate_stream(s).await.unwrap();
        assert_eq!(reply.text, "hello world");
        assert!(!reply.had_tool_calls);
    }

    #[tokio::test]
    async fn reassembles_interleaved_parallel_tool_calls_by_index() {
        let s = boxed(vec![
            Ok(ResponseEvent::ToolCall { index: 1, id: "b".into(), name: "second".into(), arguments: "{\"x\"".into() }),
            Ok(ResponseEvent::ToolCall { index: 0, id: "a".into(), name: "first".into(), arguments: "{\"y\"".into() }),
            Ok(ResponseEvent::ToolCall { index: 1, id: String::new(), name: String::new(), arguments: ":1}".into() }),
            Ok(ResponseEvent::ToolCall { index: 0, id: String::new(), name: String::new(), arguments: ":2}".into() }),
            Ok(ResponseEvent::Done),
        ]);
        let reply = accumulate_stream(s).await.unwrap();
        assert!(reply.had_tool_calls);
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].name, "first");
        assert_eq!(reply.tool_calls[0].arguments, "{\"y\":2}");
        assert_eq!(reply.tool_calls[1].name, "second");
        assert_eq!(reply.tool_calls[1].arguments, "{\"x\":1}");
    }

    #[tokio::test]
    async fn tool_call_with_empty_name_is_dropped() {
        let s = boxed(vec![
            Ok(ResponseEvent::ToolCall { index: 0, id: "a".into(), name: String::new(), arguments: "{}".into() }),
            Ok(ResponseEvent::Done),
        ]);
        let reply = accumulate_stream(s).await.unwrap();
        assert!(!reply.had_tool_calls);
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn propagates_hard_stream_error() {
        let s: ResponseStream = Box::pin(stream::iter(vec![Err(anyhow::anyhow!("boom"))]));
        assert!(accumulate_stream(s).await.is_err());
    }
}
