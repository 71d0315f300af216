// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Configuration surface consumed from collaborators.
//!
//! These are plain data structs only — no file loading or schema validation
//! lives here. The front-end that embeds the OME is responsible for reading
//! a config file (YAML, TOML, whatever it prefers) and deserializing it into
//! these types before handing them to `ome-orchestrator`. The OME performs
//! only structural validation it cannot safely skip (unique callsigns, at
//! most one squad leader) — see [`ConfigError`].
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    1000
}
fn default_context_window() -> usize {
    20
}
fn default_max_responses() -> usize {
    3
}
fn default_max_tool_iterations() -> u32 {
    5
}
fn default_llm_timeout_s() -> u64 {
    120
}
fn default_tool_timeout_s() -> u64 {
    30
}
fn default_tool_connect_timeout_s() -> u64 {
    30
}
fn default_tool_init_timeout_s() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_initial_ms() -> u64 {
    1000
}
fn default_retry_max_ms() -> u64 {
    10_000
}
fn default_retry_base() -> f64 {
    2.0
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    2
}
fn default_recovery_timeout_s() -> u64 {
    60
}
fn default_logging_level() -> String {
    "info".to_string()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4096
}

/// Whether an agent is the squad leader (fallback responder, coordination
/// authority) or a regular specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    SquadLeader,
    Specialist,
}

/// Declarative form of a single Speaking Criteria primitive (§4.9).
///
/// `ome-core` compiles a `Vec<SpeakingCriterionSpec>` into the evaluator;
/// keeping the declarative form here (rather than in `ome-core`) lets a
/// front-end construct an `AgentConfig` from a config file without
/// depending on `ome-core`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeakingCriterionSpec {
    DirectAddress,
    Keywords { words: Vec<String> },
    Question,
    SquadLeader,
}

/// Model sampling parameters for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One entry in the validated agent roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub callsign: String,
    pub role: AgentRole,
    #[serde(default)]
    pub model: ModelParams,
    pub base_prompt: String,
    #[serde(default)]
    pub speaking_criteria: Vec<SpeakingCriterionSpec>,
}

/// A tool-server descriptor: how to launch and reach one MCP peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Exponential backoff tuning for the Retry Engine (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_initial_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_retry_base")]
    pub base: f64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay_ms: default_retry_initial_ms(),
            max_delay_ms: default_retry_max_ms(),
            base: default_retry_base(),
            jitter: true,
        }
    }
}

/// Circuit breaker tuning, one instance applies per tool server (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_recovery_timeout_s")]
    pub recovery_timeout_s: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            recovery_timeout_s: default_recovery_timeout_s(),
        }
    }
}

/// Orchestration parameters (§9): history/window sizes, response cap, the
/// tool-use loop bound, and the per-layer timeouts from §5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_max_responses")]
    pub max_responses: usize,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_llm_timeout_s")]
    pub llm_timeout_s: u64,
    #[serde(default = "default_tool_timeout_s")]
    pub tool_timeout_s: u64,
    #[serde(default = "default_tool_connect_timeout_s")]
    pub tool_connect_timeout_s: u64,
    #[serde(default = "default_tool_init_timeout_s")]
    pub tool_init_timeout_s: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_window: default_context_window(),
            max_responses: default_max_responses(),
            max_tool_iterations: default_max_tool_iterations(),
            llm_timeout_s: default_llm_timeout_s(),
            tool_timeout_s: default_tool_timeout_s(),
            tool_connect_timeout_s: default_tool_connect_timeout_s(),
            tool_init_timeout_s: default_tool_init_timeout_s(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Process-wide logging configuration (§2 AMBIENT). The OME never installs
/// a subscriber itself; this is only the level a front-end should apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
        }
    }
}

/// The complete validated configuration handed to the OME at start-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OmeConfig {
    pub roster: Vec<AgentConfig>,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Structural problems the OME itself must refuse to start with, even
/// though full schema validation is the front-end's job (§7: ConfigError).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate callsign after normalization: {0}")]
    DuplicateCallsign(String),
    #[error("more than one squad_leader in roster: {0}, {1}")]
    MultipleSquadLeaders(String, String),
    #[error("empty agent roster")]
    EmptyRoster,
    #[error("unknown tool server referenced: {0}")]
    UnknownToolServer(String),
}

impl OmeConfig {
    /// Validate the structural invariants the OME depends on. Callers
    /// should have already run their own schema validation; this only
    /// checks what would otherwise corrupt orchestration semantics.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut squad_leader: Option<String> = None;
        for agent in &self.roster {
            let norm = ome_messaging_normalize(&agent.callsign);
            if let Some(existing) = seen.insert(norm.clone(), agent.agent_id.clone()) {
                let _ = existing;
                return Err(ConfigError::DuplicateCallsign(norm));
            }
            if agent.role == AgentRole::SquadLeader {
                if let Some(prior) = &squad_leader {
                    return Err(ConfigError::MultipleSquadLeaders(
                        prior.clone(),
                        agent.agent_id.clone(),
                    ));
                }
                squad_leader = Some(agent.agent_id.clone());
            }
        }
        Ok(())
    }
}

/// Mirrors `ome_messaging::normalize_callsign` without a crate dependency
/// (config validation happens before the messaging crate's normalization
/// is otherwise needed here); kept in lock-step by shared unit tests in
/// both crates.
fn ome_messaging_normalize(callsign: &str) -> String {
    let collapsed: String = callsign
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

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, callsign: &str, role: AgentRole) -> AgentConfig {
        AgentConfig {
            agent_id: id.to_string(),
            callsign: callsign.to_string(),
            role,
            model: ModelParams::default(),
            base_prompt: "you are an agent".to_string(),
            speaking_criteria: vec![],
        }
    }

    #[test]
    fn orchestration_defaults_match_spec() {
        let c = OrchestrationConfig::default();
        assert_eq!(c.max_history, 1000);
        assert_eq!(c.context_window, 20);
        assert_eq!(c.max_responses, 3);
        assert_eq!(c.max_tool_iterations, 5);
        assert_eq!(c.llm_timeout_s, 120);
        assert_eq!(c.tool_timeout_s, 30);
        assert_eq!(c.retry.max_attempts, 3);
        assert_eq!(c.retry.initial_delay_ms, 1000);
        assert_eq!(c.retry.max_delay_ms, 10_000);
        assert_eq!(c.breaker.failure_threshold, 5);
        assert_eq!(c.breaker.success_threshold, 2);
        assert_eq!(c.breaker.recovery_timeout_s, 60);
    }

    #[test]
    fn validate_rejects_empty_roster() {
        let cfg = OmeConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyRoster)));
    }

    #[test]
    fn validate_rejects_duplicate_callsigns_after_normalization() {
        let cfg = OmeConfig {
            roster: vec![
                agent("a1", "Alpha One", AgentRole::Specialist),
                agent("a2", "alpha_one", AgentRole::Specialist),
            ],
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateCallsign(_))
        ));
    }

    #[test]
    fn validate_rejects_two_squad_leaders() {
        let cfg = OmeConfig {
            roster: vec![
                agent("a1", "Rescue-Lead", AgentRole::SquadLeader),
                agent("a2", "Alpha-Two", AgentRole::SquadLeader),
            ],
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MultipleSquadLeaders(_, _))
        ));
    }

    #[test]
    fn validate_accepts_well_formed_roster() {
        let cfg = OmeConfig {
            roster: vec![
                agent("a1", "Rescue-Lead", AgentRole::SquadLeader),
                agent("a2", "Alpha-One", AgentRole::Specialist),
                agent("a3", "Alpha-Two", AgentRole::Specialist),
            ],
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn speaking_criterion_spec_round_trips_through_yaml() {
        let spec = vec![
            SpeakingCriterionSpec::DirectAddress,
            SpeakingCriterionSpec::Keywords {
                words: vec!["status".to_string(), "report".to_string()],
            },
            SpeakingCriterionSpec::Question,
            SpeakingCriterionSpec::SquadLeader,
        ];
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let back: Vec<SpeakingCriterionSpec> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn model_params_default_matches_spec_friendly_values() {
        let p = ModelParams::default();
        assert_eq!(p.max_tokens, 4096);
        assert!(p.temperature > 0.0);
    }
}
