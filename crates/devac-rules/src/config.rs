//! Loading `effect-mappings` rule files
//!
//! A package may ship `.devac/effect-mappings.yaml` (or `.yml`/`.json`) to
//! extend the built-in rules. User rules merge over the defaults by rule
//! id: same id replaces the built-in, new ids are appended.

use crate::domain::{DomainEmit, DomainEngine, DomainMatch};
use crate::engine::{Pattern, Rule};
use crate::grouping::{GroupingEmit, GroupingEngine, GroupingMatch, Layer};
use crate::significance::{SignificanceEngine, SignificanceLevel, SignificanceMatch};
use devac_core::{DevacError, NodeKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

fn default_priority() -> i32 {
    50
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainRuleSpec {
    pub id: String,
    pub name: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub effect_type: Option<String>,
    pub callee: Option<String>,
    pub callee_regex: Option<String>,
    pub target: Option<String>,
    pub source: Option<String>,
    pub is_external: Option<bool>,
    pub is_async: Option<bool>,
    pub domain: String,
    pub action: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupingRuleSpec {
    pub id: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub path: Option<String>,
    pub entity_kind: Option<String>,
    pub entity_name: Option<String>,
    pub domain: Option<String>,
    pub action: Option<String>,
    pub container: String,
    pub layer: Layer,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignificanceRuleSpec {
    pub id: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub path: Option<String>,
    pub entity_name: Option<String>,
    pub domain: Option<String>,
    pub min_dependents: Option<usize>,
    pub is_exported: Option<bool>,
    pub level: SignificanceLevel,
}

/// The parsed mapping file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectMappings {
    #[serde(default)]
    pub domains: Vec<DomainRuleSpec>,
    #[serde(default)]
    pub grouping: Vec<GroupingRuleSpec>,
    #[serde(default)]
    pub significance: Vec<SignificanceRuleSpec>,
}

const MAPPING_FILES: &[&str] = &[
    "effect-mappings.yaml",
    "effect-mappings.yml",
    "effect-mappings.json",
];

/// Load a package's mapping file, if it ships one.
pub fn load_effect_mappings(package: &Path) -> Result<Option<EffectMappings>, DevacError> {
    for name in MAPPING_FILES {
        let path = package.join(".devac").join(name);
        if !path.exists() {
            continue;
        }
        let text = std::fs::read_to_string(&path)?;
        let mappings = if name.ends_with(".json") {
            serde_json::from_str(&text)?
        } else {
            serde_yaml::from_str(&text)
                .map_err(|e| DevacError::Input(format!("{}: {e}", path.display())))?
        };
        tracing::debug!("Loaded effect mappings from {}", path.display());
        return Ok(Some(mappings));
    }
    Ok(None)
}

fn pattern_of(substring: Option<&str>, regex: Option<&str>) -> Result<Option<Pattern>, DevacError> {
    match (substring, regex) {
        (_, Some(re)) => Ok(Some(
            Pattern::regex(re).map_err(|e| DevacError::Input(format!("bad regex `{re}`: {e}")))?,
        )),
        (Some(s), None) => Ok(Some(Pattern::substring(s))),
        (None, None) => Ok(None),
    }
}

fn glob_of(pattern: Option<&str>) -> Result<Option<globset::GlobMatcher>, DevacError> {
    match pattern {
        Some(p) => Ok(Some(
            globset::Glob::new(p)
                .map_err(|e| DevacError::Input(format!("bad glob `{p}`: {e}")))?
                .compile_matcher(),
        )),
        None => Ok(None),
    }
}

impl DomainRuleSpec {
    fn into_rule(self) -> Result<Rule<DomainMatch, DomainEmit>, DevacError> {
        let when = DomainMatch {
            effect_type: self.effect_type,
            callee: pattern_of(self.callee.as_deref(), self.callee_regex.as_deref())?,
            target: pattern_of(self.target.as_deref(), None)?,
            source: pattern_of(self.source.as_deref(), None)?,
            is_external: self.is_external,
            is_async: self.is_async,
            predicate: None,
        };
        let mut emit = DomainEmit::new(self.domain, self.action);
        emit.metadata = self.metadata;
        let mut rule = Rule::new(self.id, self.priority, when, emit);
        rule.enabled = self.enabled;
        if let Some(name) = self.name {
            rule.name = name;
        }
        Ok(rule)
    }
}

impl GroupingRuleSpec {
    fn into_rule(self) -> Result<Rule<GroupingMatch, GroupingEmit>, DevacError> {
        let when = GroupingMatch {
            path_glob: glob_of(self.path.as_deref())?,
            entity_kind: self.entity_kind.as_deref().and_then(NodeKind::parse_kind),
            entity_name: pattern_of(self.entity_name.as_deref(), None)?,
            domain: self.domain,
            action: self.action,
            predicate: None,
        };
        let mut emit = GroupingEmit::new(self.container, self.layer);
        emit.tags = self.tags;
        let mut rule = Rule::new(self.id, self.priority, when, emit);
        rule.enabled = self.enabled;
        Ok(rule)
    }
}

impl SignificanceRuleSpec {
    fn into_rule(self) -> Result<Rule<SignificanceMatch, SignificanceLevel>, DevacError> {
        let when = SignificanceMatch {
            path_glob: glob_of(self.path.as_deref())?,
            entity_name: pattern_of(self.entity_name.as_deref(), None)?,
            domain: self.domain,
            min_dependents: self.min_dependents,
            is_exported: self.is_exported,
            predicate: None,
        };
        let mut rule = Rule::new(self.id, self.priority, when, self.level);
        rule.enabled = self.enabled;
        Ok(rule)
    }
}

/// Merge user rules over defaults: same id replaces, new ids append.
fn merge<M, O>(defaults: Vec<Rule<M, O>>, user: Vec<Rule<M, O>>) -> Vec<Rule<M, O>> {
    let mut merged: Vec<Rule<M, O>> = defaults
        .into_iter()
        .filter(|d| !user.iter().any(|u| u.id == d.id))
        .collect();
    merged.extend(user);
    merged
}

/// Build the three engines for a package, honoring its mapping file.
pub fn engines_for_package(
    package: &Path,
) -> Result<(DomainEngine, GroupingEngine, SignificanceEngine), DevacError> {
    let mappings = load_effect_mappings(package)?.unwrap_or_default();

    let domain_rules = mappings
        .domains
        .into_iter()
        .map(DomainRuleSpec::into_rule)
        .collect::<Result<Vec<_>, _>>()?;
    let grouping_rules = mappings
        .grouping
        .into_iter()
        .map(GroupingRuleSpec::into_rule)
        .collect::<Result<Vec<_>, _>>()?;
    let significance_rules = mappings
        .significance
        .into_iter()
        .map(SignificanceRuleSpec::into_rule)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        DomainEngine::new(merge(crate::domain::default_rules(), domain_rules)),
        GroupingEngine::new(merge(crate::grouping::default_rules(), grouping_rules)),
        SignificanceEngine::new(merge(crate::significance::default_rules(), significance_rules)),
    ))
}
