// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Prompting Contract (§4.8): the layered system prompt and transcript
//! rendering handed to [`ome_model::ModelProvider::complete`].
use ome_memory::Memory;
use ome_messaging::{callsigns_match, Message, MessageKind};
use ome_tools::ToolDescriptor;

const VOICE_NET_BOILERPLATE: &str = "\
You are one station on a shared voice-net. Messages from other stations \
are tagged with their callsign. Address a specific station as \
\"<Callsign>, this is <YourCallsign>, <message>, over.\" Address everyone \
as \"All stations, this is <YourCallsign>, <message>, over.\" Stay in \
character as your assigned role and speak only when you have something to \
contribute.";

const MEMORIZE_INSTRUCTIONS: &str = "\
To record something for later turns, emit one line per item in the exact \
form `MEMORIZE[category]: content`, where category is one of task, fact, \
decision, concern, or note. `fact` lines must be `key=value`. These lines \
may appear anywhere in your reply; they are not read aloud on the net.";

/// Build the layered system prompt for one agent turn (§4.8 layers 1-5).
pub fn build_system_prompt(base_prompt: &str, memory: &Memory, tools: &[ToolDescriptor]) -> String {
    let mut out = String::new();
    out.push_str(base_prompt.trim());
    out.push_str("\n\n");
    out.push_str(VOICE_NET_BOILERPLATE);

    let memory_fragment = memory.render_prompt_fragment();
    if !memory_fragment.is_empty() {
        out.push_str("\n\n## Memory\n");
        out.push_str(&memory_fragment);
    }

    if !tools.is_empty() {
        out.push_str("\n\n## Available tools\n");
        for tool in tools {
            out.push_str(&format!("- {} ({}): {}\n", tool.tool_name, tool.server_name, tool.description));
        }
    }

    out.push_str("\n\n");
    out.push_str(MEMORIZE_INSTRUCTIONS);
    out
}

/// Render a voice-net context window as the alternating sender-tagged
/// transcript the model sees: System messages keep their distinguished
/// role, this agent's own prior utterances become `assistant` turns, and
/// everyone else's become `user` turns tagged with their callsign.
pub fn render_transcript(window: &[Message], self_callsign: &str) -> Vec<ome_model::Message> {
    window
        .iter()
        .map(|m| match m.kind {
            MessageKind::System => ome_model::Message::system(&m.content),
            _ if callsigns_match(&m.sender, self_callsign) => ome_model::Message::assistant(&m.content),
            _ => ome_model::Message::user(format!("{}: {}", m.sender, m.content)),
        })
        .collect()
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
