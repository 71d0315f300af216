// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Agent Runtime (§4.7): the bounded tool-use state machine. One
//! [`AgentRuntime`] per roster entry; `run_turn` is serialized per agent
//! (no two turns of the same agent run concurrently — §5) by the caller
//! holding the agent behind its own lock or task.
use std::sync::Arc;
use std::time::Duration;

use ome_config::{AgentRole, ModelParams, OrchestrationConfig};
use ome_memory::{Memory, MemorizeOutcome};
use ome_messaging::Message as VoiceMessage;
use ome_model::{CompletionRequest, Message as ModelMessage, ModelProvider, ToolSchema};
use ome_tools::ToolClientPool;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::criteria::SpeakingCriterion;
use crate::error::AgentError;
use crate::prompt::{build_system_prompt, render_transcript};
use crate::reply::{accumulate_stream, AgentReply};

/// The utterance (possibly empty) and memory side-effects produced by one
/// turn (§4.7).
#[derive(Debug, Clone, Default)]
pub struct TurnOutput {
    pub text: String,
    pub memorize: MemorizeOutcome,
}

impl TurnOutput {
    fn empty() -> Self {
        Self::default()
    }
}

enum CallOutcome {
    Reply(AgentReply),
    Cancelled,
}

/// Runtime state for one agent: identity, model binding, scratchpad
/// memory, and an optional reference to the tool federation (§3 `Agent`).
pub struct AgentRuntime {
    pub agent_id: String,
    pub callsign: String,
    pub role: AgentRole,
    pub model_params: ModelParams,
    pub base_prompt: String,
    pub speaking_criteria: Vec<SpeakingCriterion>,
    model: Arc<dyn ModelProvider>,
    tool_pool: Option<Arc<ToolClientPool>>,
    memory: AsyncMutex<Memory>,
}

impl AgentRuntime {
    pub fn new(
        agent_id: impl Into<String>,
        callsign: impl Into<String>,
        role: AgentRole,
        model_params: ModelParams,
        base_prompt: impl Into<String>,
        speaking_criteria: Vec<SpeakingCriterion>,
        model: Arc<dyn ModelProvider>,
        tool_pool: Option<Arc<ToolClientPool>>,
        memory_cap: usize,
    ) -> Self {
        let agent_id = agent_id.into();
        tracing::info!(agent_id = %agent_id, "agent.initialized");
        Self {
            agent_id,
            callsign: callsign.into(),
            role,
            model_params,
            base_prompt: base_prompt.into(),
            speaking_criteria,
            model,
            tool_pool,
            memory: AsyncMutex::new(Memory::new(memory_cap)),
        }
    }

    pub fn is_squad_leader(&self) -> bool {
        self.role == AgentRole::SquadLeader
    }

    /// A clone of this agent's current scratchpad memory, for the Snapshot
    /// Manager (§4.11).
    pub async fn snapshot_memory(&self) -> Memory {
        self.memory.lock().await.clone()
    }

    /// Replace this agent's scratchpad memory wholesale — used when
    /// restoring a session (§4.11). Never called concurrently with
    /// `run_turn` for the same agent in practice (§5: turns are serialized
    /// per agent by the caller).
    pub async fn restore_memory(&self, memory: Memory) {
        *self.memory.lock().await = memory;
    }

    /// A read-only snapshot of the effective tool catalog (empty if no
    /// Tool Registry is wired — §4.7 input 2).
    async fn tool_catalog(&self) -> Vec<ome_tools::ToolDescriptor> {
        match &self.tool_pool {
            Some(pool) => pool.registry().list_all(),
            None => Vec::new(),
        }
    }

    /// Run one bounded tool-use turn against `context_window` (§4.7).
    pub async fn run_turn(
        &self,
        context_window: Vec<VoiceMessage>,
        cancel: &CancellationToken,
        config: &OrchestrationConfig,
    ) -> Result<TurnOutput, AgentError> {
        tracing::info!(agent_id = %self.agent_id, callsign = %self.callsign, "agent.turn.start");
        if cancel.is_cancelled() {
            return Ok(TurnOutput::empty());
        }

        let mut memory = self.memory.lock().await;
        let tools = self.tool_catalog().await;
        let system = build_system_prompt(&self.base_prompt, &memory, &tools);
        let mut transcript = render_transcript(&context_window, &self.callsign);
        let tool_schemas: Vec<ToolSchema> = tools
            .iter()
            .map(|t| ToolSchema {
                name: t.tool_name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            })
            .collect();

        let llm_timeout = Duration::from_secs(config.llm_timeout_s);

        let mut reply = match self.call_model(&system, transcript.clone(), tool_schemas.clone(), cancel, llm_timeout).await? {
            CallOutcome::Reply(r) => r,
            CallOutcome::Cancelled => return Ok(TurnOutput::empty()),
        };

        let mut iteration = 0u32;
        while reply.had_tool_calls {
            iteration += 1;
            if iteration > config.max_tool_iterations {
                return Err(AgentError::OverflowError { max_iterations: config.max_tool_iterations });
            }
            if cancel.is_cancelled() {
                return Ok(TurnOutput::empty());
            }

            // Phase 1: push every assistant tool-call message before any
            // tool-result message (mirrors the parallel-tool-call wire
            // format most providers expect).
            for tc in &reply.tool_calls {
                transcript.push(ModelMessage::tool_call(tc.id.clone(), tc.name.clone(), tc.arguments.clone()));
            }

            // Phase 2: dispatch every tool call concurrently via
            // tokio::spawn, one task per call.
            let mut tasks = Vec::with_capacity(reply.tool_calls.len());
            for tc in reply.tool_calls.clone() {
                let pool = self.tool_pool.clone();
                let cancel = cancel.clone();
                tasks.push(tokio::spawn(async move { dispatch_one_tool_call(pool, tc, &cancel).await }));
            }

            // Await tasks in their original (not completion) order so the
            // tool-result messages line up with the tool-call messages
            // that requested them (§9 open question).
            let mut outputs = Vec::with_capacity(tasks.len());
            for (i, task) in tasks.into_iter().enumerate() {
                let (id, content, is_error) = match task.await {
                    Ok(v) => v,
                    Err(e) => (reply.tool_calls[i].id.clone(), format!("tool execution panicked: {e}"), true),
                };
                outputs.push((id, content, is_error));
            }

            // Phase 3: push the tool-result messages.
            for (id, content, is_error) in outputs {
                transcript.push(ModelMessage::tool_result(id, content, is_error));
            }

            if cancel.is_cancelled() {
                return Ok(TurnOutput::empty());
            }
            reply = match self.call_model(&system, transcript.clone(), tool_schemas.clone(), cancel, llm_timeout).await? {
                CallOutcome::Reply(r) => r,
                CallOutcome::Cancelled => return Ok(TurnOutput::empty()),
            };
        }

        let memorize = memory.apply_memorize_lines(&reply.text);
        tracing::info!(agent_id = %self.agent_id, callsign = %self.callsign, "agent.turn.end");
        Ok(TurnOutput { text: reply.text, memorize })
    }

    async fn call_model(
        &self,
        system: &str,
        mut messages: Vec<ModelMessage>,
        tools: Vec<ToolSchema>,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<CallOutcome, AgentError> {
        if cancel.is_cancelled() {
            return Ok(CallOutcome::Cancelled);
        }
        messages.insert(0, ModelMessage::system(system));
        let req = CompletionRequest { messages, tools };

        let stream_result = tokio::select! {
            res = tokio::time::timeout(timeout, self.model.complete(req)) => res,
            _ = cancel.cancelled() => return Ok(CallOutcome::Cancelled),
        };

        let stream = match stream_result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(AgentError::AgentResponseError { cause: e.to_string() }),
            Err(_) => return Err(AgentError::AgentResponseError { cause: "llm request timed out".to_string() }),
        };

        let reply = tokio::select! {
            res = accumulate_stream(stream) => res.map_err(|e| AgentError::AgentResponseError { cause: e.to_string() })?,
            _ = cancel.cancelled() => return Ok(CallOutcome::Cancelled),
        };
        Ok(CallOutcome::Reply(reply))
    }
}

/// Run one tool call to completion, mapping every failure kind to a
/// structured textual tool-result rather than aborting the loop (§4.7/§7).
async fn dispatch_one_tool_call(
    pool: Option<Arc<ToolClientPool>>,
    tc: crate::reply::ToolCallRequest,
    cancel: &CancellationToken,
) -> (String, String, bool) {
    let Some(pool) = pool else {
        return (tc.id, "no tool registry configured for this agent".to_string(), true);
    };
    let args: serde_json::Value = match serde_json::from_str(&tc.arguments) {
        Ok(v) => v,
        Err(e) => return (tc.id, format!("[ArgumentParseError] invalid tool arguments: {e}"), true),
    };
    match pool.call_tool(&tc.name, args, cancel).await {
        Ok(output) => (tc.id, output, false),
        Err(e) => (tc.id, format!("[{}] {e}", e.kind_tag()), true),
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ome_messaging::{MessageKind, MessageType};
    use ome_model::ScriptedMockProvider;

    fn orchestration_config() -> OrchestrationConfig {
        OrchestrationConfig::default()
    }

    fn runtime(model: Arc<dyn ModelProvider>, criteria: Vec<SpeakingCriterion>) -> AgentRuntime {
        AgentRuntime::new(
            "agent-1",
            "Alpha One",
            AgentRole::Specialist,
            ModelParams::default(),
            "You are a specialist.",
            criteria,
            model,
            None,
            20,
        )
    }

    fn user_msg(body: &str) -> VoiceMessage {
        VoiceMessage::new("COMMAND", None, body, MessageKind::User, MessageType::Report, true)
    }

    #[tokio::test]
    async fn plain_text_reply_requires_no_tool_round() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("all clear"));
        let rt = runtime(model, vec![]);
        let cancel = CancellationToken::new();
        let out = rt.run_turn(vec![user_msg("status")], &cancel, &orchestration_config()).await.unwrap();
        assert_eq!(out.text, "all clear");
    }

    #[tokio::test]
    async fn memorize_lines_are_extracted_from_final_text() {
        let model: Arc<dyn ModelProvider> =
            Arc::new(ScriptedMockProvider::always_text("on it\nMEMORIZE[task]: verify weather\nover."));
        let rt = runtime(model, vec![]);
        let cancel = CancellationToken::new();
        let out = rt.run_turn(vec![user_msg("status")], &cancel, &orchestration_config()).await.unwrap();
        assert_eq!(out.memorize.applied, 1);
    }

    #[tokio::test]
    async fn tool_use_forever_aborts_with_overflow_error() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::tool_use_forever("search", "{}"));
        let rt = runtime(model, vec![]);
        let cancel = CancellationToken::new();
        let mut cfg = orchestration_config();
        cfg.max_tool_iterations = 2;
        let err = rt.run_turn(vec![user_msg("search something")], &cancel, &cfg).await.unwrap_err();
        assert!(matches!(err, AgentError::OverflowError { max_iterations: 2 }));
    }

    /// S4: a tool server exposing `search_airports(query)` runs through a
    /// real `ToolClientPool` (backed by a mock transport, not a child
    /// process) — the LLM's tool_use block is resolved via the Registry,
    /// dispatched through the pool, and the tool's output feeds back into
    /// the next LLM turn, which then emits the final text.
    #[tokio::test]
    async fn tool_call_round_trips_through_the_tool_client_pool() {
        use ome_tools::{BreakerConfig, MockTransport, PoolTimeouts, RetryConfig, ToolClientPool, ToolDescriptor, ToolRegistry, TransportResult};

        let registry = Arc::new(ToolRegistry::new());
        registry.install(ToolDescriptor::new(
            "search_airports",
            "aviation",
            "searches airports near a query",
            serde_json::json!({"type": "object"}),
        ));
        let pool = Arc::new(ToolClientPool::new(
            registry,
            PoolTimeouts::default(),
            RetryConfig::default(),
            BreakerConfig::default(),
        ));
        let mock = Arc::new(MockTransport::always(TransportResult::Ok {
            content: r#"[{"code":"SFO"}]"#.to_string(),
            is_error: false,
        }));
        pool.install_session("aviation", mock.clone()).await;

        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::tool_then_text(
            "call-1",
            "search_airports",
            r#"{"query":"San Francisco"}"#,
            "Found SFO near San Francisco, over.",
        ));
        let rt = AgentRuntime::new(
            "agent-1",
            "Alpha One",
            AgentRole::Specialist,
            ModelParams::default(),
            "You are a specialist.",
            vec![],
            model,
            Some(pool),
            20,
        );
        let cancel = CancellationToken::new();
        let out = rt
            .run_turn(vec![user_msg("search airports near San Francisco")], &cancel, &orchestration_config())
            .await
            .unwrap();
        assert_eq!(out.text, "Found SFO near San Francisco, over.");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_call_without_registry_surfaces_as_tool_result_not_abort() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::tool_then_text(
            "call-1",
            "search_airports",
            "{}",
            "Found nothing without tools.",
        ));
        let rt = runtime(model, vec![]);
        let cancel = CancellationToken::new();
        let out = rt.run_turn(vec![user_msg("search airports")], &cancel, &orchestration_config()).await.unwrap();
        assert_eq!(out.text, "Found nothing without tools.");
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_empty_utterance() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("should not run"));
        let rt = runtime(model, vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = rt.run_turn(vec![user_msg("status")], &cancel, &orchestration_config()).await.unwrap();
        assert_eq!(out.text, "");
    }
}
