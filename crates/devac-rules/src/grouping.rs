//! Architectural grouping: container and layer assignment

use crate::engine::{Pattern, Rule, RuleEngine, RuleMatch};
use devac_core::NodeKind;
use serde::{Deserialize, Serialize};

/// Architecture layer for C4-style views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Presentation,
    Application,
    Domain,
    Infrastructure,
}

/// The entity/effect context a grouping decision looks at.
#[derive(Debug, Clone)]
pub struct GroupingInput {
    pub file_path: String,
    pub entity_name: String,
    pub entity_kind: Option<NodeKind>,
    pub domain: Option<String>,
    pub action: Option<String>,
}

/// Match condition for grouping rules.
#[derive(Default)]
pub struct GroupingMatch {
    pub path_glob: Option<globset::GlobMatcher>,
    pub entity_kind: Option<NodeKind>,
    pub entity_name: Option<Pattern>,
    pub domain: Option<String>,
    pub action: Option<String>,
    pub predicate: Option<fn(&GroupingInput) -> bool>,
}

impl GroupingMatch {
    pub fn path(pattern: &str) -> Result<Self, globset::Error> {
        Ok(GroupingMatch {
            path_glob: Some(globset::Glob::new(pattern)?.compile_matcher()),
            ..GroupingMatch::default()
        })
    }
}

impl RuleMatch for GroupingMatch {
    type Input = GroupingInput;

    fn matches(&self, input: &GroupingInput) -> bool {
        if let Some(glob) = &self.path_glob {
            if !glob.is_match(&input.file_path) {
                return false;
            }
        }
        if let Some(kind) = self.entity_kind {
            if input.entity_kind != Some(kind) {
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
        if let Some(action) = &self.action {
            if input.action.as_deref() != Some(action.as_str()) {
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

/// Container/layer assignment emitted on match.
#[derive(Debug, Clone)]
pub struct GroupingEmit {
    pub container: String,
    pub layer: Layer,
    pub tags: Vec<String>,
}

impl GroupingEmit {
    pub fn new(container: impl Into<String>, layer: Layer) -> Self {
        GroupingEmit {
            container: container.into(),
            layer,
            tags: Vec::new(),
        }
    }
}

/// Assigns each entity/effect a container and layer; unmatched inputs land
/// in the configured default container.
pub struct GroupingEngine {
    engine: RuleEngine<GroupingMatch, GroupingEmit>,
    default_emit: GroupingEmit,
}

impl GroupingEngine {
    pub fn new(rules: Vec<Rule<GroupingMatch, GroupingEmit>>) -> Self {
        GroupingEngine {
            engine: RuleEngine::new(rules),
            default_emit: GroupingEmit::new("Other", Layer::Application),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    pub fn with_default_container(mut self, container: impl Into<String>, layer: Layer) -> Self {
        self.default_emit = GroupingEmit::new(container, layer);
        self
    }

    /// Assign a container; falls back to the default, never `None`.
    pub fn apply(&mut self, input: &GroupingInput) -> GroupingEmit {
        match self.engine.apply(input) {
            Some(rule) => rule.emit.clone(),
            None => self.default_emit.clone(),
        }
    }

    pub fn apply_all(&mut self, inputs: &[GroupingInput]) -> Vec<GroupingEmit> {
        inputs.iter().map(|i| self.apply(i)).collect()
    }

    pub fn add_rule(&mut self, rule: Rule<GroupingMatch, GroupingEmit>) {
        self.engine.add_rule(rule);
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        self.engine.remove_rule(id)
    }
}

fn glob_rule(id: &str, priority: i32, pattern: &str, emit: GroupingEmit) -> Rule<GroupingMatch, GroupingEmit> {
    // Built-in globs are static and known-valid.
    let matcher = GroupingMatch::path(pattern).expect("built-in glob");
    Rule::new(id, priority, matcher, emit)
}

/// Conventional source-layout grouping used without a mapping file.
pub fn default_rules() -> Vec<Rule<GroupingMatch, GroupingEmit>> {
    vec![
        glob_rule(
            "ui-layer",
            90,
            "**/{components,pages,views,ui}/**",
            GroupingEmit::new("UI", Layer::Presentation),
        ),
        glob_rule(
            "api-layer",
            90,
            "**/{routes,controllers,handlers,api}/**",
            GroupingEmit::new("API", Layer::Application),
        ),
        glob_rule(
            "domain-layer",
            80,
            "**/{domain,models,entities}/**",
            GroupingEmit::new("Domain", Layer::Domain),
        ),
        glob_rule(
            "infrastructure-layer",
            80,
            "**/{db,database,repositories,infra,infrastructure,clients}/**",
            GroupingEmit::new("Infrastructure", Layer::Infrastructure),
        ),
        Rule::new(
            "persistence-domain",
            50,
            GroupingMatch {
                domain: Some("persistence".to_string()),
                ..GroupingMatch::default()
            },
            GroupingEmit::new("Infrastructure", Layer::Infrastructure),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(file: &str) -> GroupingInput {
        GroupingInput {
            file_path: file.to_string(),
            entity_name: "handler".to_string(),
            entity_kind: Some(NodeKind::Function),
            domain: None,
            action: None,
        }
    }

    #[test]
    fn test_path_glob_grouping() {
        let mut engine = GroupingEngine::with_defaults();
        let emit = engine.apply(&input("src/components/Button.tsx"));
        assert_eq!(emit.container, "UI");
        assert_eq!(emit.layer, Layer::Presentation);

        let emit = engine.apply(&input("src/routes/users.ts"));
        assert_eq!(emit.container, "API");
    }

    #[test]
    fn test_unmatched_gets_default_container() {
        let mut engine = GroupingEngine::with_defaults();
        let emit = engine.apply(&input("src/misc/thing.ts"));
        assert_eq!(emit.container, "Other");
    }

    #[test]
    fn test_domain_based_grouping() {
        let mut engine = GroupingEngine::with_defaults();
        let mut i = input("src/misc/db_helper.ts");
        i.domain = Some("persistence".to_string());
        let emit = engine.apply(&i);
        assert_eq!(emit.layer, Layer::Infrastructure);
    }
}
