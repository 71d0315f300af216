// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Agent Runtime (§4.7): Speaking Criteria, the Prompting Contract, and
//! the bounded tool-use loop driving one agent through an LLM and the tool
//! federation.
mod agent;
mod criteria;
mod error;
mod prompt;
mod reply;

pub use agent::{AgentRuntime, TurnOutput};
pub use criteria::{compile as compile_speaking_criteria, evaluate as evaluate_speaking_criteria, EvalContext, SpeakingCriterion};
pub use error::AgentError;
pub use prompt::{build_system_prompt, render_transcript};
pub use reply::{accumulate_stream, AgentReply, ToolCallRequest};
