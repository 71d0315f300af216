// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Per-agent scratchpad Memory (§3/§4.3): five bounded categories, in-band
//! `MEMORIZE[category]: content` command extraction, and a compact prompt
//! fragment renderer consumed by the Prompting Contract (§4.8).
use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

use regex::Regex;

/// The five fixed scratchpad categories (§3). `KeyFacts` is a map; the rest
/// are ordered, capped sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryCategory {
    TaskList,
    KeyFacts,
    DecisionsMade,
    Concerns,
    Notes,
}

impl MemoryCategory {
    /// Resolve a category name from a `MEMORIZE[...]` tag or a structured
    /// update, case-insensitively, mapping singular aliases to their plural
    /// canonical category per §4.3.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "task" | "task_list" | "tasks" => Some(Self::TaskList),
            "fact" | "key_facts" | "facts" => Some(Self::KeyFacts),
            "decision" | "decisions_made" | "decisions" => Some(Self::DecisionsMade),
            "concern" | "concerns" => Some(Self::Concerns),
            "note" | "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

const DEFAULT_CAP: usize = 20;

/// Per-agent scratchpad memory. All sequence categories are bounded to
/// `cap` entries (default 20, matching §3's "cap >= 20" for `task_list`);
/// `key_facts` upserts by key and is unbounded (a map of facts about the
/// mission, not an append-only log).
#[derive(Debug, Clone, Default)]
pub struct Memory {
    cap: usize,
    task_list: VecDeque<String>,
    key_facts: HashMap<String, String>,
    decisions_made: VecDeque<String>,
    concerns: VecDeque<String>,
    notes: VecDeque<String>,
}

/// Tally of a batch of `MEMORIZE[...]` line applications (§8 property 10).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorizeOutcome {
    pub applied: usize,
    pub warnings: usize,
}

impl Memory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            ..Default::default()
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn task_list(&self) -> &VecDeque<String> {
        &self.task_list
    }
    pub fn key_facts(&self) -> &HashMap<String, String> {
        &self.key_facts
    }
    pub fn decisions_made(&self) -> &VecDeque<String> {
        &self.decisions_made
    }
    pub fn concerns(&self) -> &VecDeque<String> {
        &self.concerns
    }
    pub fn notes(&self) -> &VecDeque<String> {
        &self.notes
    }

    fn push_capped(seq: &mut VecDeque<String>, cap: usize, value: String) {
        if seq.len() >= cap {
            seq.pop_front();
        }
        seq.push_back(value);
    }

    /// Apply one structured `(category, payload)` update. Returns `false`
    /// (and logs a warning) when `category` is `KeyFacts` and `payload` is
    /// not of the form `key=value` — every other combination always
    /// succeeds.
    pub fn apply_update(&mut self, category: MemoryCategory, payload: &str) -> bool {
        match category {
            MemoryCategory::KeyFacts => match payload.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    self.key_facts.insert(k.trim().to_string(), v.trim().to_string());
                    true
                }
                _ => {
                    tracing::warn!(payload, "key_facts payload is not key=value, rejected");
                    false
                }
            },
            MemoryCategory::TaskList => {
                Self::push_capped(&mut self.task_list, self.cap, payload.to_string());
                true
            }
            MemoryCategory::DecisionsMade => {
                Self::push_capped(&mut self.decisions_made, self.cap, payload.to_string());
                true
            }
            MemoryCategory::Concerns => {
                Self::push_capped(&mut self.concerns, self.cap, payload.to_string());
                true
            }
            MemoryCategory::Notes => {
                Self::push_capped(&mut self.notes, self.cap, payload.to_string());
                true
            }
        }
    }

    /// Extract and apply every `MEMORIZE[category]: content` line in `text`
    /// (§4.3). Invalid category names and invalid `key_facts` payloads are
    /// each counted as a warning and logged; everything else is applied.
    pub fn apply_memorize_lines(&mut self, text: &str) -> MemorizeOutcome {
        let mut outcome = MemorizeOutcome::default();
        for caps in memorize_regex().captures_iter(text) {
            let category_raw = &caps["category"];
            let content = caps["content"].trim();
            match MemoryCategory::parse(category_raw) {
                Some(category) => {
                    if self.apply_update(category, content) {
                        outcome.applied += 1;
                        tracing::info!(category = category_raw, content, "memory.update");
                    } else {
                        outcome.warnings += 1;
                    }
                }
                None => {
                    tracing::warn!(category = category_raw, "unknown MEMORIZE category, skipped");
                    outcome.warnings += 1;
                }
            }
        }
        outcome
    }

    /// A compact human-readable summary of current contents, for the
    /// "Memory summary" layer of the Prompting Contract (§4.8).
    pub fn render_prompt_fragment(&self) -> String {
        let mut out = String::new();
        if !self.task_list.is_empty() {
            out.push_str("Task list:\n");
            for t in &self.task_list {
                out.push_str("- ");
                out.push_str(t);
                out.push('\n');
            }
        }
        if !self.key_facts.is_empty() {
            out.push_str("Known facts:\n");
            let mut keys: Vec<&String> = self.key_facts.keys().collect();
            keys.sort();
            for k in keys {
                out.push_str(&format!("- {k} = {}\n", self.key_facts[k]));
            }
        }
        if !self.decisions_made.is_empty() {
            out.push_str("Decisions made:\n");
            for d in &self.decisions_made {
                out.push_str("- ");
                out.push_str(d);
                out.push('\n');
            }
        }
        if !self.concerns.is_empty() {
            out.push_str("Concerns:\n");
            for c in &self.concerns {
                out.push_str("- ");
                out.push_str(c);
                out.push('\n');
            }
        }
        if !self.notes.is_empty() {
            out.push_str("Notes:\n");
            for n in &self.notes {
                out.push_str("- ");
                out.push_str(n);
                out.push('\n');
            }
        }
        out
    }
}

fn memorize_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^MEMORIZE\[(?P<category>[^\]]+)\]:\s*(?P<content>.+)$")
            .expect("static MEMORIZE regex is valid")
    })
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_handles_singular_and_plural_aliases() {
        assert_eq!(MemoryCategory::parse("task"), Some(MemoryCategory::TaskList));
        assert_eq!(MemoryCategory::parse("Task_List"), Some(MemoryCategory::TaskList));
        assert_eq!(MemoryCategory::parse("fact"), Some(MemoryCategory::KeyFacts));
        assert_eq!(MemoryCategory::parse("DECISION"), Some(MemoryCategory::DecisionsMade));
        assert_eq!(MemoryCategory::parse("concern"), Some(MemoryCategory::Concerns));
        assert_eq!(MemoryCategory::parse("note"), Some(MemoryCategory::Notes));
        assert_eq!(MemoryCategory::parse("bogus"), None);
    }

    #[test]
    fn key_facts_upserts_on_key_equals_value() {
        let mut m = Memory::new(20);
        assert!(m.apply_update(MemoryCategory::KeyFacts, "weather=clear"));
        assert!(m.apply_update(MemoryCategory::KeyFacts, "weather=overcast"));
        assert_eq!(m.key_facts().len(), 1);
        assert_eq!(m.key_facts()["weather"], "overcast");
    }

    #[test]
    fn key_facts_rejects_non_key_value_payload() {
        let mut m = Memory::new(20);
        assert!(!m.apply_update(MemoryCategory::KeyFacts, "just some text"));
        assert!(m.key_facts().is_empty());
    }

    #[test]
    fn sequence_categories_append_and_truncate_to_cap() {
        let mut m = Memory::new(3);
        for i in 0..5 {
            m.apply_update(MemoryCategory::Notes, &format!("note {i}"));
        }
        assert_eq!(m.notes().len(), 3);
        assert_eq!(m.notes()[0], "note 2");
        assert_eq!(m.notes()[2], "note 4");
    }

    #[test]
    fn apply_memorize_lines_counts_valid_and_invalid() {
        let mut m = Memory::new(20);
        let text = "Searching now.\n\
                     MEMORIZE[task]: Verify KBOS weather\n\
                     MEMORIZE[fact]: weather=clear\n\
                     MEMORIZE[bogus]: should warn\n\
                     MEMORIZE[fact]: not a kv pair\n\
                     Done.";
        let outcome = m.apply_memorize_lines(text);
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.warnings, 2);
        assert_eq!(m.task_list().len(), 1);
        assert_eq!(m.key_facts()["weather"], "clear");
    }

    #[test]
    fn apply_memorize_lines_respects_category_cap_after_update() {
        let mut m = Memory::new(20);
        for i in 0..20 {
            m.apply_update(MemoryCategory::Notes, &format!("n{i}"));
        }
        let outcome = m.apply_memorize_lines("MEMORIZE[note]: n20");
        assert_eq!(outcome.applied, 1);
        assert_eq!(m.notes().len(), 20);
        assert_eq!(m.notes().back().unwrap(), "n20");
        assert_eq!(m.notes().front().unwrap(), "n1");
    }

    #[test]
    fn memorize_regex_is_line_anchored_not_substring() {
        let mut m = Memory::new(20);
        let outcome = m.apply_memorize_lines("see MEMORIZE[task]: inline should not match");
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.warnings, 0);
    }

    #[test]
    fn render_prompt_fragment_omits_empty_categories() {
        let m = Memory::new(20);
        assert_eq!(m.render_prompt_fragment(), "");
        let mut m2 = Memory::new(20);
        m2.apply_update(MemoryCategory::Notes, "hello");
        let frag = m2.render_prompt_fragment();
        assert!(frag.contains("Notes:"));
        assert!(!frag.contains("Task list:"));
    }
}
