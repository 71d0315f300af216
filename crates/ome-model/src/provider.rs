// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{CompletionRequest, ResponseEvent};

/// A streamed sequence of [`ResponseEvent`]s from one `complete` call.
pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The LLM provider interface (§6): `generate(system, messages, tools) ->
/// {stop_reason, content_blocks}`, realized here as a streaming call whose
/// events the Agent Runtime accumulates into one [`crate::AgentReply`].
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name, used in observability events (§6).
    fn name(&self) -> &str;

    /// Model identifier as configured for the calling agent.
    fn model_name(&self) -> &str;

    /// Send one completion request and return its streamed response.
    ///
    /// Any `Err` returned here — or carried as the first item of the stream
    /// — is a hard provider failure: the Agent Runtime surfaces it as
    /// `AgentResponseError` and aborts the turn (§7, §9 AMBIENT open-question
    /// resolution: the OME does not pattern-match provider errors to
    /// classify rate limits).
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
