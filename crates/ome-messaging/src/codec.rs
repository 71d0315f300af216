// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Voice-Net Codec (§4.1): parses and formats military-style addressed
//! radio messages, and classifies message intent.

use crate::MessageType;

const BROADCAST_TOKENS: &[&str] = &["all", "all stations", "all units", "all agents"];
const ACK_WORDS: &[&str] = &["roger", "copy", "wilco"];
const QUERY_LEADS: &[&str] = &["what", "how", "why", "when", "where", "who"];
const COMMAND_VERBS: &[&str] = &["search", "calculate", "compute", "execute", "release"];
const REQUEST_MARKERS: &[&str] = &["please", "can you", "could you", "would you"];

/// The decoded shape of one voice-net transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub is_broadcast: bool,
    pub message_type: MessageType,
    pub body: String,
}

/// Normalize a callsign for matching: uppercase, collapse runs of
/// spaces/underscores/hyphens into a single hyphen, strip trailing
/// punctuation. Two callsigns address the same agent iff their normalized
/// forms are equal.
pub fn normalize_callsign(raw: &str) -> String {
    let collapsed: String = raw
        .trim()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect();
    let mut out = String::with_capacity(collapsed.len());
    let mut last_was_hyphen = false;
    for c in collapsed.chars() {
        if c == '-' {
            if !last_was_hyphen {
                out.push('-');
            }
            last_was_hyphen = true;
        } else {
            out.push(c);
            last_was_hyphen = false;
        }
    }
    out.trim_matches(|c: char| c == '-' || c.is_ascii_punctuation())
        .to_uppercase()
}

/// Two callsigns refer to the same station iff their normalized forms match.
pub fn callsigns_match(a: &str, b: &str) -> bool {
    normalize_callsign(a) == normalize_callsign(b)
}

fn strip_trailing_over(s: &str) -> &str {
    let trimmed = s.trim().trim_end_matches(['.', '!', ' ']);
    let lower = trimmed.to_lowercase();
    if let Some(idx) = lower.rfind(',') {
        let tail = lower[idx + 1..].trim();
        if tail == "over" {
            return trimmed[..idx].trim_end();
        }
    }
    if lower.ends_with("over") && lower.len() >= 4 {
        let head = trimmed[..trimmed.len() - 4].trim_end().trim_end_matches(',');
        return head.trim_end();
    }
    trimmed
}

fn is_broadcast_recipient(recipient: &str) -> bool {
    let norm = recipient.trim().to_lowercase();
    BROADCAST_TOKENS.contains(&norm.as_str())
}

fn word_at_start(body_lower: &str, words: &[&str]) -> bool {
    let first_word = body_lower
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("");
    words.contains(&first_word)
}

fn contains_whole_word(body_lower: &str, word: &str) -> bool {
    if !word.contains(' ') {
        body_lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == word)
    } else {
        body_lower.contains(word)
    }
}

/// Classify a message body per the §4.1 priority order: first hit wins.
pub fn classify_message_type(body: &str) -> MessageType {
    let lower = body.to_lowercase();

    if word_at_start(&lower, ACK_WORDS) {
        return MessageType::Acknowledgment;
    }
    if word_at_start(&lower, QUERY_LEADS) || body.trim_end().ends_with('?') {
        return MessageType::Query;
    }
    if COMMAND_VERBS.iter().any(|v| contains_whole_word(&lower, v)) {
        return MessageType::Command;
    }
    if REQUEST_MARKERS.iter().any(|m| contains_whole_word(&lower, m)) {
        return MessageType::Request;
    }
    MessageType::Report
}

/// Parse a content string into a [`ParsedMessage`].
pub fn parse(content: &str) -> ParsedMessage {
    let head_is_broadcast_phrase = content.trim().to_lowercase().starts_with("all stations");
    let working = strip_trailing_over(content);

    // Shortened acknowledgment form: a leading Roger/Copy/Wilco is not an
    // addressed recipient, it IS the transmission — classify directly
    // rather than feeding it through the recipient/sender comma split.
    if word_at_start(&working.to_lowercase(), ACK_WORDS) {
        return ParsedMessage {
            sender: None,
            recipient: None,
            is_broadcast: head_is_broadcast_phrase,
            message_type: MessageType::Acknowledgment,
            body: working.trim().to_string(),
        };
    }

    // Form: "<Recipient>, this is <Sender>, <body>"
    if let Some((recipient, rest)) = split_once_ci(working, ",") {
        let rest_trim = rest.trim_start();
        if let Some(after_this_is) = strip_ci_prefix(rest_trim, "this is") {
            let after_this_is = after_this_is.trim_start();
            if let Some((sender, body)) = split_once_ci(after_this_is, ",") {
                let recipient = recipient.trim();
                let is_broadcast = head_is_broadcast_phrase || is_broadcast_recipient(recipient);
                let body = body.trim().to_string();
                return ParsedMessage {
                    sender: Some(sender.trim().to_string()),
                    recipient: if is_broadcast {
                        None
                    } else {
                        Some(recipient.to_string())
                    },
                    is_broadcast,
                    message_type: classify_message_type(&body),
                    body,
                };
            }
        }

        // Form: "<Recipient>, <body>" — sender unknown.
        let recipient = recipient.trim();
        let is_broadcast = head_is_broadcast_phrase || is_broadcast_recipient(recipient);
        let body = rest.trim().to_string();
        return ParsedMessage {
            sender: None,
            recipient: if is_broadcast {
                None
            } else {
                Some(recipient.to_string())
            },
            is_broadcast,
            message_type: classify_message_type(&body),
            body,
        };
    }

    // No comma structure at all — treat the whole trimmed string as body.
    let body = working.trim().to_string();
    ParsedMessage {
        sender: None,
        recipient: None,
        is_broadcast: head_is_broadcast_phrase,
        message_type: classify_message_type(&body),
        body,
    }
}

/// Format a `(recipient, sender, body)` triple back into voice-net form —
/// the inverse of the "this is" recognized form in [`parse`].
pub fn format(recipient: &str, sender: &str, body: &str) -> String {
    format!("{recipient}, this is {sender}, {body}, over.")
}

fn split_once_ci<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    s.find(sep).map(|idx| (&s[..idx], &s[idx + sep.len()..]))
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() {
        return None;
    }
    if s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
