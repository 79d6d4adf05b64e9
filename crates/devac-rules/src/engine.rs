//! The generic rule engine all three classifiers instantiate

use std::collections::HashMap;

/// A match condition over some input type.
pub trait RuleMatch: Send + Sync {
    type Input;
    fn matches(&self, input: &Self::Input) -> bool;
}

/// One rule: a match condition plus the payload emitted on match.
#[derive(Debug, Clone)]
pub struct Rule<M, O> {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub when: M,
    pub emit: O,
}

impl<M, O> Rule<M, O> {
    pub fn new(id: impl Into<String>, priority: i32, when: M, emit: O) -> Self {
        let id = id.into();
        Rule {
            name: id.clone(),
            id,
            priority,
            enabled: true,
            when,
            emit,
        }
    }
}

/// Priority-sorted, first-match-wins rule list with per-rule hit counts.
pub struct RuleEngine<M: RuleMatch, O> {
    rules: Vec<Rule<M, O>>,
    stats: HashMap<String, u64>,
}

impl<M: RuleMatch, O> RuleEngine<M, O> {
    pub fn new(mut rules: Vec<Rule<M, O>>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleEngine {
            rules,
            stats: HashMap::new(),
        }
    }

    /// First enabled rule matching the input, in descending priority order.
    pub fn apply(&mut self, input: &M::Input) -> Option<&Rule<M, O>> {
        let idx = self
            .rules
            .iter()
            .position(|rule| rule.enabled && rule.when.matches(input))?;
        *self.stats.entry(self.rules[idx].id.clone()).or_insert(0) += 1;
        Some(&self.rules[idx])
    }

    pub fn add_rule(&mut self, rule: Rule<M, O>) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove a rule by id. Returns whether anything was removed.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn rules(&self) -> &[Rule<M, O>] {
        &self.rules
    }

    pub fn stats(&self) -> &HashMap<String, u64> {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.clear();
    }
}

/// Text match used throughout rule conditions: plain substring or regex.
#[derive(Debug, Clone)]
pub enum Pattern {
    Substring(String),
    Regex(regex::Regex),
}

impl Pattern {
    pub fn substring(s: impl Into<String>) -> Self {
        Pattern::Substring(s.into())
    }

    pub fn regex(s: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(regex::Regex::new(s)?))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Substring(s) => text.contains(s.as_str()),
            Pattern::Regex(r) => r.is_match(text),
        }
    }
}
