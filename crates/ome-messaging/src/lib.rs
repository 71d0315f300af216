// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Voice-net message model: the [`Message`] record, the bounded
//! [`MessageLog`], and the Voice-Net Codec for parsing/formatting/
//! classifying addressed radio transmissions.
pub mod codec;
mod log;
mod message;

pub use codec::{callsigns_match, classify_message_type, normalize_callsign, format, parse, ParsedMessage};
pub use log::MessageLog;
pub use message::{Message, MessageKind, MessageType};
