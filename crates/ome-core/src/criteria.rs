// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Speaking Criteria (§4.9): compiled, per-agent predicates over the most
//! recent message, OR-composed.
use ome_config::SpeakingCriterionSpec;
use ome_messaging::{callsigns_match, Message, MessageType};

/// Coordination keywords that arm the squad leader's fallback criterion
/// even when a specialist has already matched (§4.9: "a coordination
/// keyword is present").
const COORDINATION_KEYWORDS: &[&str] = &["team", "everyone", "coordinate", "regroup", "status update"];

/// Runtime form of one [`SpeakingCriterionSpec`].
#[derive(Debug, Clone)]
pub enum SpeakingCriterion {
    DirectAddress,
    Keywords(Vec<String>),
    Question,
    SquadLeader,
}

impl From<&SpeakingCriterionSpec> for SpeakingCriterion {
    fn from(spec: &SpeakingCriterionSpec) -> Self {
        match spec {
            SpeakingCriterionSpec::DirectAddress => Self::DirectAddress,
            SpeakingCriterionSpec::Keywords { words } => Self::Keywords(words.clone()),
            SpeakingCriterionSpec::Question => Self::Question,
            SpeakingCriterionSpec::SquadLeader => Self::SquadLeader,
        }
    }
}

/// Compile a declarative roster entry's criteria into their runtime form.
pub fn compile(specs: &[SpeakingCriterionSpec]) -> Vec<SpeakingCriterion> {
    specs.iter().map(SpeakingCriterion::from).collect()
}

/// Extra facts the Orchestrator supplies that a lone per-agent predicate
/// cannot derive on its own (§4.9 SquadLeader primitive).
pub struct EvalContext {
    pub callsign: String,
    pub is_squad_leader: bool,
    /// Whether any specialist's criteria already fired for this same
    /// message, evaluated before the squad leader (§4.10 responder
    /// selection runs squad_leader-aware, not squad_leader-first).
    pub any_specialist_matched: bool,
}

fn contains_any_whole_word(body: &str, words: &[&str]) -> bool {
    let lower = body.to_lowercase();
    let tokens: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    words.iter().any(|w| {
        let w = w.to_lowercase();
        if w.contains(' ') {
            lower.contains(&w)
        } else {
            tokens.iter().any(|t| *t == w)
        }
    })
}

/// Evaluate whether any of `criteria` fire against `recent`, the most
/// recent messages visible to this agent. Self-silence (§8 property 11)
/// is enforced here: nothing fires if the most recent message was sent by
/// this agent itself.
pub fn evaluate(criteria: &[SpeakingCriterion], recent: &[Message], ctx: &EvalContext) -> bool {
    let Some(last) = recent.last() else {
        return false;
    };
    if callsigns_match(&last.sender, &ctx.callsign) {
        return false;
    }

    criteria.iter().any(|c| match c {
        SpeakingCriterion::DirectAddress => last
            .recipient
            .as_deref()
            .is_some_and(|r| callsigns_match(r, &ctx.callsign)),
        SpeakingCriterion::Keywords(words) => {
            let refs: Vec<&str> = words.iter().map(String::as_str).collect();
            contains_any_whole_word(&last.content, &refs)
        }
        SpeakingCriterion::Question => last.message_type == MessageType::Query,
        SpeakingCriterion::SquadLeader => {
            ctx.is_squad_leader
                && (!ctx.any_specialist_matched || contains_any_whole_word(&last.content, COORDINATION_KEYWORDS))
        }
    })
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ome_messaging::MessageKind;

    fn msg(sender: &str, recipient: Option<&str>, content: &str, mtype: MessageType) -> Message {
        Message::new(sender, recipient.map(String::from), content, MessageKind::User, mtype, recipient.is_none())
    }

    fn ctx(callsign: &str, squad_leader: bool, any_specialist_matched: bool) -> EvalContext {
        EvalContext { callsign: callsign.into(), is_squad_leader: squad_leader, any_specialist_matched }
    }

    #[test]
    fn direct_address_fires_on_matching_recipient() {
        let criteria = vec![SpeakingCriterion::DirectAddress];
        let recent = vec![msg("COMMAND", Some("Alpha One"), "status", MessageType::Report)];
        assert!(evaluate(&criteria, &recent, &ctx("ALPHA-ONE", false, false)));
        assert!(!evaluate(&criteria, &recent, &ctx("ALPHA-TWO", false, false)));
    }

    #[test]
    fn keywords_matches_whole_word_only() {
        let criteria = vec![SpeakingCriterion::Keywords(vec!["weather".into()])];
        let hit = vec![msg("COMMAND", None, "what's the weather like", MessageType::Query)];
        let miss = vec![msg("COMMAND", None, "stormweathering ahead", MessageType::Report)];
        assert!(evaluate(&criteria, &hit, &ctx("ALPHA-ONE", false, false)));
        assert!(!evaluate(&criteria, &miss, &ctx("ALPHA-ONE", false, false)));
    }

    #[test]
    fn question_fires_only_on_query_type() {
        let criteria = vec![SpeakingCriterion::Question];
        let q = vec![msg("COMMAND", None, "what is your status", MessageType::Query)];
        let r = vec![msg("COMMAND", None, "status nominal", MessageType::Report)];
        assert!(evaluate(&criteria, &q, &ctx("ALPHA-ONE", false, false)));
        assert!(!evaluate(&criteria, &r, &ctx("ALPHA-ONE", false, false)));
    }

    #[test]
    fn squad_leader_fires_when_no_specialist_matched() {
        let criteria = vec![SpeakingCriterion::SquadLeader];
        let recent = vec![msg("COMMAND", None, "status", MessageType::Report)];
        assert!(evaluate(&criteria, &recent, &ctx("RESCUE-LEAD", true, false)));
        assert!(!evaluate(&criteria, &recent, &ctx("RESCUE-LEAD", true, true)));
    }

    #[test]
    fn squad_leader_fires_on_coordination_keyword_even_if_specialist_matched() {
        let criteria = vec![SpeakingCriterion::SquadLeader];
        let recent = vec![msg("COMMAND", None, "team, regroup at base", MessageType::Report)];
        assert!(evaluate(&criteria, &recent, &ctx("RESCUE-LEAD", true, true)));
    }

    #[test]
    fn squad_leader_never_fires_for_non_squad_leader_agent() {
        let criteria = vec![SpeakingCriterion::SquadLeader];
        let recent = vec![msg("COMMAND", None, "status", MessageType::Report)];
        assert!(!evaluate(&criteria, &recent, &ctx("ALPHA-ONE", false, false)));
    }

    #[test]
    fn self_silence_suppresses_every_criterion() {
        let criteria = vec![SpeakingCriterion::Question, SpeakingCriterion::Keywords(vec!["status".into()])];
        let recent = vec![msg("ALPHA-ONE", None, "what is the status?", MessageType::Query)];
        assert!(!evaluate(&criteria, &recent, &ctx("ALPHA-ONE", false, false)));
    }

    #[test]
    fn no_recent_messages_never_fires() {
        let criteria = vec![SpeakingCriterion::Question];
        assert!(!evaluate(&criteria, &[], &ctx("ALPHA-ONE", false, false)));
    }
}
