//! Domain classification of raw effects

use crate::engine::{Pattern, Rule, RuleEngine, RuleMatch};
use devac_core::{EffectPayload, EffectRecord};
use std::collections::HashMap;
use std::time::Instant;

/// The callee-ish text of an effect, whichever variant it is.
fn effect_callee(effect: &EffectRecord) -> &str {
    match &effect.payload {
        EffectPayload::FunctionCall { callee_name, .. } => callee_name,
        EffectPayload::Send { target, .. } => target,
        EffectPayload::Store { target_resource, .. } | EffectPayload::Retrieve { target_resource, .. } => {
            target_resource
        }
    }
}

fn effect_target(effect: &EffectRecord) -> Option<&str> {
    match &effect.payload {
        EffectPayload::Store { target_resource, .. }
        | EffectPayload::Retrieve { target_resource, .. } => Some(target_resource),
        EffectPayload::Send { target, .. } => Some(target),
        EffectPayload::FunctionCall { external_module, .. } => external_module.as_deref(),
    }
}

fn effect_is_external(effect: &EffectRecord) -> bool {
    match &effect.payload {
        EffectPayload::FunctionCall { is_external, .. } => *is_external,
        EffectPayload::Send { is_third_party, .. } => *is_third_party,
        _ => false,
    }
}

fn effect_is_async(effect: &EffectRecord) -> bool {
    matches!(&effect.payload, EffectPayload::FunctionCall { is_async: true, .. })
}

/// Match condition over one effect. All set fields must hold.
#[derive(Debug, Clone, Default)]
pub struct DomainMatch {
    /// `FunctionCall`, `Store`, `Retrieve`, `Send`.
    pub effect_type: Option<String>,
    pub callee: Option<Pattern>,
    pub target: Option<Pattern>,
    /// Matches the source entity id (file/package scoping).
    pub source: Option<Pattern>,
    pub is_external: Option<bool>,
    pub is_async: Option<bool>,
    pub predicate: Option<fn(&EffectRecord) -> bool>,
}

impl RuleMatch for DomainMatch {
    type Input = EffectRecord;

    fn matches(&self, effect: &EffectRecord) -> bool {
        if let Some(t) = &self.effect_type {
            if t != effect.effect_type() {
                return false;
            }
        }
        if let Some(p) = &self.callee {
            if !p.matches(effect_callee(effect)) {
                return false;
            }
        }
        if let Some(p) = &self.target {
            match effect_target(effect) {
                Some(target) if p.matches(target) => {}
                _ => return false,
            }
        }
        if let Some(p) = &self.source {
            if !p.matches(&effect.source_entity_id) {
                return false;
            }
        }
        if let Some(expected) = self.is_external {
            if effect_is_external(effect) != expected {
                return false;
            }
        }
        if let Some(expected) = self.is_async {
            if effect_is_async(effect) != expected {
                return false;
            }
        }
        if let Some(predicate) = self.predicate {
            if !predicate(effect) {
                return false;
            }
        }
        true
    }
}

/// What a matched domain rule tags the effect with.
#[derive(Debug, Clone)]
pub struct DomainEmit {
    pub domain: String,
    pub action: String,
    pub metadata: HashMap<String, String>,
}

impl DomainEmit {
    pub fn new(domain: impl Into<String>, action: impl Into<String>) -> Self {
        DomainEmit {
            domain: domain.into(),
            action: action.into(),
            metadata: HashMap::new(),
        }
    }
}

/// A classified effect.
#[derive(Debug, Clone)]
pub struct DomainEffect {
    pub effect_id: String,
    pub source_entity_id: String,
    pub domain: String,
    pub action: String,
    pub metadata: HashMap<String, String>,
    pub rule_id: String,
}

/// Result of processing a batch of effects.
#[derive(Debug, Clone, Default)]
pub struct DomainReport {
    pub domain_effects: Vec<DomainEffect>,
    pub matched: usize,
    pub unmatched: usize,
    pub rule_stats: HashMap<String, u64>,
    pub process_time_ms: u64,
}

/// First-match-wins classifier from raw effects to (domain, action) tags.
pub struct DomainEngine {
    engine: RuleEngine<DomainMatch, DomainEmit>,
}

impl DomainEngine {
    pub fn new(rules: Vec<Rule<DomainMatch, DomainEmit>>) -> Self {
        DomainEngine {
            engine: RuleEngine::new(rules),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    pub fn apply_to_effect(&mut self, effect: &EffectRecord) -> Option<DomainEffect> {
        let rule = self.engine.apply(effect)?;
        Some(DomainEffect {
            effect_id: effect.effect_id.clone(),
            source_entity_id: effect.source_entity_id.clone(),
            domain: rule.emit.domain.clone(),
            action: rule.emit.action.clone(),
            metadata: rule.emit.metadata.clone(),
            rule_id: rule.id.clone(),
        })
    }

    pub fn apply_to_effects(&mut self, effects: &[EffectRecord]) -> DomainReport {
        self.process(effects)
    }

    pub fn process(&mut self, effects: &[EffectRecord]) -> DomainReport {
        let started = Instant::now();
        let mut report = DomainReport::default();
        for effect in effects {
            match self.apply_to_effect(effect) {
                Some(classified) => {
                    report.matched += 1;
                    report.domain_effects.push(classified);
                }
                None => report.unmatched += 1,
            }
        }
        report.rule_stats = self.engine.stats().clone();
        report.process_time_ms = started.elapsed().as_millis() as u64;
        report
    }

    pub fn add_rule(&mut self, rule: Rule<DomainMatch, DomainEmit>) {
        self.engine.add_rule(rule);
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        self.engine.remove_rule(id)
    }

    pub fn rules(&self) -> &[Rule<DomainMatch, DomainEmit>] {
        self.engine.rules()
    }
}

/// Built-in classification used when a package ships no mapping file.
pub fn default_rules() -> Vec<Rule<DomainMatch, DomainEmit>> {
    vec![
        Rule::new(
            "http-send",
            100,
            DomainMatch {
                effect_type: Some("Send".to_string()),
                ..DomainMatch::default()
            },
            DomainEmit::new("http", "send"),
        ),
        Rule::new(
            "persistence-write",
            90,
            DomainMatch {
                effect_type: Some("Store".to_string()),
                ..DomainMatch::default()
            },
            DomainEmit::new("persistence", "write"),
        ),
        Rule::new(
            "persistence-read",
            90,
            DomainMatch {
                effect_type: Some("Retrieve".to_string()),
                ..DomainMatch::default()
            },
            DomainEmit::new("persistence", "read"),
        ),
        Rule::new(
            "logging",
            80,
            DomainMatch {
                effect_type: Some("FunctionCall".to_string()),
                callee: Some(Pattern::substring("console.")),
                ..DomainMatch::default()
            },
            DomainEmit::new("observability", "log"),
        ),
        Rule::new(
            "external-integration",
            50,
            DomainMatch {
                effect_type: Some("FunctionCall".to_string()),
                is_external: Some(true),
                ..DomainMatch::default()
            },
            DomainEmit::new("integration", "call"),
        ),
    ]
}
