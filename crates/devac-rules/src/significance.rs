//! Significance levels for entities and their effects

use crate::engine::{Pattern, Rule, RuleEngine, RuleMatch};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How prominently an entity should surface in views and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignificanceLevel {
    Hidden,
    Minor,
    Important,
    Critical,
}

/// Aggregate context the significance rules consult: computed once per
/// package from nodes and edges.
#[derive(Debug, Clone, Default)]
pub struct SignificanceContext {
    pub total_entities: usize,
    pub exported_entities: HashSet<String>,
    /// entity id → number of entities depending on it.
    pub dependent_counts: HashMap<String, usize>,
}

impl SignificanceContext {
    pub fn dependents_of(&self, entity_id: &str) -> usize {
        self.dependent_counts.get(entity_id).copied().unwrap_or(0)
    }

    /// Aggregate a package's records: exported set from nodes, dependent
    /// counts from distinct edge sources per target.
    pub fn from_records(
        nodes: &[devac_core::NodeRecord],
        edges: &[devac_core::EdgeRecord],
    ) -> Self {
        let mut ctx = SignificanceContext {
            total_entities: nodes.len(),
            ..SignificanceContext::default()
        };
        for node in nodes {
            if node.is_exported {
                ctx.exported_entities.insert(node.entity_id.clone());
            }
        }
        let mut sources_per_target: HashMap<&str, HashSet<&str>> = HashMap::new();
        for edge in edges {
            if edge.is_deleted || edge.target_entity_id.starts_with(devac_core::UNRESOLVED_PREFIX) {
                continue;
            }
            sources_per_target
                .entry(edge.target_entity_id.as_str())
                .or_default()
                .insert(edge.source_entity_id.as_str());
        }
        for (target, sources) in sources_per_target {
            ctx.dependent_counts.insert(target.to_string(), sources.len());
        }
        ctx
    }
}

/// One entity under evaluation, with its context-derived facts inlined.
#[derive(Debug, Clone)]
pub struct SignificanceInput {
    pub entity_id: String,
    pub entity_name: String,
    pub file_path: String,
    pub domain: Option<String>,
    pub is_exported: bool,
    pub dependents: usize,
}

impl SignificanceInput {
    pub fn from_context(
        ctx: &SignificanceContext,
        entity_id: &str,
        entity_name: &str,
        file_path: &str,
        domain: Option<String>,
    ) -> Self {
        SignificanceInput {
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            file_path: file_path.to_string(),
            domain,
            is_exported: ctx.exported_entities.contains(entity_id),
            dependents: ctx.dependents_of(entity_id),
        }
    }
}

/// Match condition for significance rules.
#[derive(Default)]
pub struct SignificanceMatch {
    pub path_glob: Option<globset::GlobMatcher>,
    pub entity_name: Option<Pattern>,
    pub domain: Option<String>,
    pub min_dependents: Option<usize>,
    pub is_exported: Option<bool>,
    pub predicate: Option<fn(&SignificanceInput) -> bool>,
}

impl RuleMatch for SignificanceMatch {
    type Input = SignificanceInput;

    fn matches(&self, input: &SignificanceInput) -> bool {
        if let Some(glob) = &self.path_glob {
            if !glob.is_match(&input.file_path) {
                return false;
            }
        }
        if let Some(pattern) = &self.entity_name {
            if !pattern.matches(&input.entity_name) {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            if input.domain.as_deref() != Some(domain.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_dependents {
            if input.dependents < min {
                return false;
            }
        }
        if let Some(expected) = self.is_exported {
            if input.is_exported != expected {
                return false;
            }
        }
        if let Some(predicate) = self.predicate {
            if !predicate(input) {
                return false;
            }
        }
        true
    }
}

/// Assigns significance levels; unmatched inputs default to `Minor`.
pub struct SignificanceEngine {
    engine: RuleEngine<SignificanceMatch, SignificanceLevel>,
    default_level: SignificanceLevel,
}

impl SignificanceEngine {
    pub fn new(rules: Vec<Rule<SignificanceMatch, SignificanceLevel>>) -> Self {
        SignificanceEngine {
            engine: RuleEngine::new(rules),
            default_level: SignificanceLevel::Minor,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    pub fn apply(&mut self, input: &SignificanceInput) -> SignificanceLevel {
        match self.engine.apply(input) {
            Some(rule) => rule.emit,
            None => self.default_level,
        }
    }

    pub fn apply_all(&mut self, inputs: &[SignificanceInput]) -> Vec<SignificanceLevel> {
        inputs.iter().map(|i| self.apply(i)).collect()
    }

    /// Keep only inputs at or above a level.
    pub fn filter_by_level(
        &mut self,
        inputs: Vec<SignificanceInput>,
        minimum: SignificanceLevel,
    ) -> Vec<SignificanceInput> {
        inputs
            .into_iter()
            .filter(|input| self.apply(input) >= minimum)
            .collect()
    }

    pub fn add_rule(&mut self, rule: Rule<SignificanceMatch, SignificanceLevel>) {
        self.engine.add_rule(rule);
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        self.engine.remove_rule(id)
    }
}

/// Built-in significance heuristics.
pub fn default_rules() -> Vec<Rule<SignificanceMatch, SignificanceLevel>> {
    vec![
        Rule::new(
            "widely-depended-on",
            100,
            SignificanceMatch {
                min_dependents: Some(5),
                ..SignificanceMatch::default()
            },
            SignificanceLevel::Critical,
        ),
        Rule::new(
            "exported-api",
            80,
            SignificanceMatch {
                is_exported: Some(true),
                min_dependents: Some(1),
                ..SignificanceMatch::default()
            },
            SignificanceLevel::Important,
        ),
        Rule::new(
            "generated-code",
            70,
            SignificanceMatch {
                path_glob: Some(
                    globset::Glob::new("**/{generated,__generated__,dist}/**")
                        .expect("built-in glob")
                        .compile_matcher(),
                ),
                ..SignificanceMatch::default()
            },
            SignificanceLevel::Hidden,
        ),
    ]
}
