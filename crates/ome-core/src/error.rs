// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Agent-level fault kinds (§7): these abort a turn rather than being
//! threaded back to the model as tool-result data.

/// A fault raised by the Agent Runtime itself, as opposed to a tool
/// failure (which is rendered as tool-result data and does not abort the
/// loop — see `ome_tools::ToolError`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("agent response failed: {cause}")]
    AgentResponseError { cause: String },

    #[error("tool-use loop exceeded {max_iterations} iterations")]
    OverflowError { max_iterations: u32 },
}
