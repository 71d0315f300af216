// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Orchestrator (§4.10): turn scheduling over a shared voice-net. One
//! [`Orchestrator`] owns the roster and the [`MessageLog`]; each incoming
//! transmission is addressed or broadcast, responders are selected, and
//! their turns run concurrently via `tokio::spawn` — the same spawn-all,
//! await-in-order pattern `ome-core` uses for parallel tool calls,
//! generalized one level up to parallel agent turns.
use std::sync::Arc;

use ome_config::OrchestrationConfig;
use ome_core::{evaluate_speaking_criteria, AgentRuntime, EvalContext};
use ome_messaging::{parse, Message, MessageKind, MessageLog};
use tokio_util::sync::CancellationToken;

/// One agent's spoken utterance for this turn, in the order it is reported
/// back to the caller (§4.10: squad_leader first, then registration order —
/// independent of the order turns actually completed in).
#[derive(Debug, Clone)]
pub struct Utterance {
    pub callsign: String,
    pub text: String,
}

/// Owns the roster and the shared [`MessageLog`], and runs one turn of
/// addressing, responder selection, and parallel dispatch per incoming
/// transmission (§4.10).
pub struct Orchestrator {
    pub log: Arc<MessageLog>,
    agents: Vec<Arc<AgentRuntime>>,
    config: OrchestrationConfig,
}

impl Orchestrator {
    /// `agents` is the roster in registration order; at most one entry may
    /// be the squad leader (enforced upstream by `OmeConfig::validate`).
    pub fn new(log: Arc<MessageLog>, agents: Vec<Arc<AgentRuntime>>, config: OrchestrationConfig) -> Self {
        Self { log, agents, config }
    }

    pub fn agents(&self) -> &[Arc<AgentRuntime>] {
        &self.agents
    }

    fn find_agent(&self, callsign: &str) -> Option<&Arc<AgentRuntime>> {
        self.agents
            .iter()
            .find(|a| ome_messaging::callsigns_match(&a.callsign, callsign))
    }

    fn squad_leader(&self) -> Option<&Arc<AgentRuntime>> {
        self.agents.iter().find(|a| a.is_squad_leader())
    }

    /// Append one externally-originated transmission to the log, run the
    /// responder(s) it provokes, and return their utterances in reported
    /// order. Turns that are cancelled or produce an empty utterance are
    /// silently omitted (§4.10, §8 property 11: self-silence already rules
    /// out the degenerate case of an agent answering itself).
    pub async fn handle_message(&self, content: impl Into<String>, cancel: &CancellationToken) -> Vec<Utterance> {
        let content = content.into();
        let parsed = parse(&content);
        let user_message = Message::new(
            parsed.sender.clone().unwrap_or_else(|| "OPERATOR".to_string()),
            parsed.recipient.clone(),
            parsed.body.clone(),
            MessageKind::User,
            parsed.message_type,
            parsed.is_broadcast,
        );
        self.log.append(user_message).await;

        self.run_responders(parsed.recipient.as_deref(), cancel).await
    }

    /// Re-evaluate responders against the log's current tail and run a
    /// turn without appending a new transmission first — used by a
    /// front-end driving an agent-to-agent exchange where the provoking
    /// message was an agent utterance already appended by a prior call.
    pub async fn run_responders(&self, addressed_to: Option<&str>, cancel: &CancellationToken) -> Vec<Utterance> {
        let recent_one = self.log.recent(1).await;
        let (responders, is_broadcast_case) = self.select_responders(addressed_to, &recent_one);

        let mut appended = self.dispatch(&responders, cancel).await;

        // §8 property 5: in the broadcast case, if nobody spoke and a squad
        // leader exists, the squad leader gets one fallback turn even if it
        // was already among `responders` and produced nothing the first
        // time.
        if is_broadcast_case && appended.is_empty() {
            if let Some(sl) = self.squad_leader().cloned() {
                appended = self.dispatch(std::slice::from_ref(&sl), cancel).await;
            }
        }

        self.order_for_reporting(appended)
    }

    /// Run every responder's turn concurrently, appending each non-empty
    /// utterance to the log in completion order, and return the
    /// `(agent, text)` pairs that actually spoke.
    async fn dispatch(&self, responders: &[Arc<AgentRuntime>], cancel: &CancellationToken) -> Vec<(Arc<AgentRuntime>, String)> {
        if responders.is_empty() {
            return Vec::new();
        }

        let mut tasks = Vec::with_capacity(responders.len());
        for agent in responders {
            let agent = Arc::clone(agent);
            let log = Arc::clone(&self.log);
            let cancel = cancel.clone();
            let config = self.config.clone();
            tasks.push(tokio::spawn(async move {
                let window = log.context_window(&agent.callsign, config.context_window).await;
                let result = agent.run_turn(window, &cancel, &config).await;
                (agent, result)
            }));
        }

        let mut spoke = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok((agent, Ok(turn))) => {
                    if !turn.text.is_empty() {
                        let reply_parsed = parse(&turn.text);
                        let msg = Message::new(
                            agent.callsign.clone(),
                            reply_parsed.recipient,
                            turn.text.clone(),
                            MessageKind::Agent,
                            reply_parsed.message_type,
                            reply_parsed.is_broadcast,
                        );
                        self.log.append(msg).await;
                        spoke.push((agent, turn.text));
                    }
                }
                Ok((agent, Err(e))) => {
                    tracing::warn!(callsign = %agent.callsign, error = %e, "agent turn failed");
                    self.log
                        .append(Message::system(format!("{} failed to respond: {e}", agent.callsign)))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "agent turn task panicked");
                }
            }
        }
        spoke
    }

    /// Responder selection (§4.10). Returns the selected agents and whether
    /// this was a broadcast/undirected transmission (the case the fallback
    /// rule in [`Self::run_responders`] applies to).
    fn select_responders(&self, addressed_to: Option<&str>, recent_one: &[Message]) -> (Vec<Arc<AgentRuntime>>, bool) {
        if let Some(recipient) = addressed_to {
            if let Some(agent) = self.find_agent(recipient) {
                return (vec![Arc::clone(agent)], false);
            }
            return match self.squad_leader() {
                Some(sl) => (vec![Arc::clone(sl)], false),
                None => (Vec::new(), false),
            };
        }

        let mut any_specialist_matched = false;
        let mut matched_specialists = Vec::new();
        for agent in &self.agents {
            if agent.is_squad_leader() {
                continue;
            }
            let ctx = EvalContext {
                callsign: agent.callsign.clone(),
                is_squad_leader: false,
                any_specialist_matched: false,
            };
            if evaluate_speaking_criteria(&agent.speaking_criteria, recent_one, &ctx) {
                any_specialist_matched = true;
                matched_specialists.push(Arc::clone(agent));
            }
        }

        let mut responders = Vec::new();
        if let Some(sl) = self.squad_leader() {
            let ctx = EvalContext {
                callsign: sl.callsign.clone(),
                is_squad_leader: true,
                any_specialist_matched,
            };
            if evaluate_speaking_criteria(&sl.speaking_criteria, recent_one, &ctx) {
                responders.push(Arc::clone(sl));
            }
        }
        responders.extend(matched_specialists);
        responders.truncate(self.config.max_responses.max(1));
        (responders, true)
    }

    /// Reorder the utterances that were appended (in completion order) into
    /// the deterministic reporting order: squad_leader first, then the
    /// rest in roster registration order.
    fn order_for_reporting(&self, spoke: Vec<(Arc<AgentRuntime>, String)>) -> Vec<Utterance> {
        let mut out = Vec::with_capacity(spoke.len());
        if let Some(sl) = self.squad_leader() {
            if let Some((agent, text)) = spoke.iter().find(|(a, _)| Arc::ptr_eq(a, sl)) {
                out.push(Utterance { callsign: agent.callsign.clone(), text: text.clone() });
            }
        }
        for agent in &self.agents {
            if self.squad_leader().is_some_and(|sl| Arc::ptr_eq(sl, agent)) {
                continue;
            }
            if let Some((_, text)) = spoke.iter().find(|(a, _)| Arc::ptr_eq(a, agent)) {
                out.push(Utterance { callsign: agent.callsign.clone(), text: text.clone() });
            }
        }
        out
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
