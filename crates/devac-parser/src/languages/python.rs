//! Python extraction using tree-sitter

use super::{
    FileContext, bind_local_targets, classify_call, column_to_u32, has_token_child, node_text,
    point_to_u32,
};
use crate::parser_pool::{Grammar, ParseRequest, ParserPool};
use crate::{LanguageParser, ParseResult, ParserConfig};
use devac_core::{EdgeKind, NodeKind, Visibility, unresolved_target};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tree_sitter::Node;

const BUILTIN_GLOBALS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "list", "dict", "set", "tuple", "open",
    "isinstance", "issubclass", "super", "type", "enumerate", "zip", "map", "filter", "sorted",
    "getattr", "setattr", "hasattr", "abs", "min", "max", "sum", "any", "all", "repr", "iter",
    "next", "format", "bool", "bytes", "callable", "classmethod", "staticmethod", "property",
];

pub struct PythonParser {
    pool: ParserPool,
}

impl PythonParser {
    pub fn new(pool: ParserPool) -> Self {
        Self { pool }
    }
}

struct Walker<'a, 'cfg> {
    ctx: &'a FileContext<'cfg>,
    out: &'a mut ParseResult,
    source: &'a [u8],
    module_id: String,
    owner_stack: Vec<String>,
    /// Local name → module specifier for import-derived call tagging.
    imports: HashMap<String, String>,
    top_level: Vec<String>,
}

impl<'a, 'cfg> Walker<'a, 'cfg> {
    fn owner(&self) -> String {
        self.owner_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.module_id.clone())
    }

    fn visit(&mut self, node: Node, class_ctx: Option<(&str, &str)>) {
        match node.kind() {
            "import_statement" => {
                self.extract_import(node);
                return;
            }
            "import_from_statement" => {
                self.extract_import_from(node);
                return;
            }
            "decorated_definition" => {
                let decorators = self.collect_decorators(node);
                if let Some(definition) = node.child_by_field_name("definition") {
                    match definition.kind() {
                        "function_definition" => {
                            self.extract_function(definition, class_ctx, decorators)
                        }
                        "class_definition" => self.extract_class(definition, decorators),
                        _ => {}
                    }
                }
                return;
            }
            "function_definition" => {
                self.extract_function(node, class_ctx, Vec::new());
                return;
            }
            "class_definition" => {
                self.extract_class(node, Vec::new());
                return;
            }
            "assignment" => {
                self.extract_constant(node, class_ctx);
                // Right-hand side may contain calls.
            }
            "call" => {
                self.extract_call(node);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, class_ctx);
        }
    }

    /// `import os`, `import os.path as osp`
    fn extract_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let module = node_text(child, self.source).to_string();
                    let local = module.split('.').next().unwrap_or(&module).to_string();
                    self.push_ref(node, &module, "*", local, true);
                }
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, self.source).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| node_text(n, self.source).to_string())
                        .unwrap_or_else(|| module.clone());
                    self.push_ref(node, &module, "*", alias, true);
                }
                _ => {}
            }
        }
    }

    /// `from pkg import a, b as c`, `from .helpers import h`
    fn extract_import_from(&mut self, node: Node) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = node_text(module_node, self.source).to_string();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            // The module_name field also matches dotted_name; skip it.
            if child.id() == module_node.id() {
                continue;
            }
            match child.kind() {
                "dotted_name" | "identifier" => {
                    let name = node_text(child, self.source).to_string();
                    self.push_ref(node, &module, &name, name.clone(), false);
                }
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, self.source).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| node_text(n, self.source).to_string())
                        .unwrap_or_else(|| name.clone());
                    self.push_ref(node, &module, &name, alias, false);
                }
                "wildcard_import" => {
                    self.push_ref(node, &module, "*", "*".to_string(), true);
                }
                _ => {}
            }
        }
    }

    fn push_ref(&mut self, node: Node, module: &str, symbol: &str, local: String, is_namespace: bool) {
        self.imports.insert(local, module.to_string());
        self.out.external_refs.push(devac_core::ExternalRefRecord {
            source_entity_id: self.module_id.clone(),
            module_specifier: module.to_string(),
            imported_symbol: symbol.to_string(),
            is_type_only: false,
            is_default: false,
            is_namespace,
            file_path: self.ctx.rel_path.clone(),
            line: point_to_u32(node.start_position()),
            column: column_to_u32(node.start_position()),
            is_resolved: false,
            target_entity_id: None,
            branch: self.ctx.cfg.branch.clone(),
            is_deleted: false,
            updated_at: self.ctx.updated_at,
        });
        let mut edge = self.ctx.new_edge(
            &self.module_id,
            &unresolved_target(module),
            EdgeKind::Imports,
            Some(node),
        );
        edge.properties = Some(serde_json::json!({ "specifier": module }).to_string());
        self.out.edges.push(edge);
    }

    fn collect_decorators(&self, node: Node) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                out.push(
                    node_text(child, self.source)
                        .trim_start_matches('@')
                        .trim()
                        .to_string(),
                );
            }
        }
        out
    }

    fn extract_function(&mut self, node: Node, class_ctx: Option<(&str, &str)>, decorators: Vec<String>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let (kind, qualified) = match class_ctx {
            Some((class_name, _)) => (
                NodeKind::Method,
                format!("{}::{}::{}", self.ctx.rel_path, class_name, name),
            ),
            None => (NodeKind::Function, self.ctx.qualify(&name)),
        };
        let mut record = self.ctx.new_node(kind, &name, &qualified, node);
        record.is_async = has_token_child(node, "async");
        record.is_static = decorators.iter().any(|d| d == "staticmethod");
        record.visibility = Some(if name.starts_with('_') {
            Visibility::Private
        } else {
            Visibility::Public
        });
        record.is_exported = class_ctx.is_none() && self.owner_stack.is_empty() && !name.starts_with('_');
        record.signature = node
            .child_by_field_name("parameters")
            .map(|p| format!("{name}{}", node_text(p, self.source)));
        record.doc = docstring(node, self.source);
        record.decorators = decorators;
        let entity = record.entity_id.clone();
        if class_ctx.is_none() && self.owner_stack.is_empty() {
            self.top_level.push(entity.clone());
        }
        self.out.nodes.push(record);

        if let Some((_, class_entity)) = class_ctx {
            self.out.edges.push(self.ctx.new_edge(
                class_entity,
                &entity,
                EdgeKind::Defines,
                Some(node),
            ));
        }

        self.owner_stack.push(entity);
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.visit(child, None);
            }
        }
        self.owner_stack.pop();
    }

    fn extract_class(&mut self, node: Node, decorators: Vec<String>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(NodeKind::Class, &name, &qualified, node);
        record.is_exported = self.owner_stack.is_empty() && !name.starts_with('_');
        record.visibility = Some(if name.starts_with('_') {
            Visibility::Private
        } else {
            Visibility::Public
        });
        record.doc = docstring(node, self.source);
        record.decorators = decorators;
        let class_entity = record.entity_id.clone();
        if self.owner_stack.is_empty() {
            self.top_level.push(class_entity.clone());
        }
        self.out.nodes.push(record);

        // Base classes: `class Child(Base, mixins.Mixin):`
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    let base_name = node_text(base, self.source).to_string();
                    self.out.edges.push(self.ctx.new_edge(
                        &class_entity,
                        &unresolved_target(&base_name),
                        EdgeKind::Extends,
                        Some(superclasses),
                    ));
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.visit(child, Some((&name, &class_entity)));
            }
        }
    }

    /// Module-level `NAME = value` with an ALL_CAPS name becomes a Constant.
    fn extract_constant(&mut self, node: Node, class_ctx: Option<(&str, &str)>) {
        if class_ctx.is_some() || !self.owner_stack.is_empty() {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.source).to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()) {
            return;
        }
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(NodeKind::Constant, &name, &qualified, node);
        record.is_exported = !name.starts_with('_');
        self.top_level.push(record.entity_id.clone());
        self.out.nodes.push(record);
    }

    fn extract_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let callee_name = node_text(function, self.source).to_string();
        if callee_name.is_empty() {
            return;
        }
        let root = callee_name.split('.').next().unwrap_or(&callee_name);
        let is_awaited = node.parent().map_or(false, |p| p.kind() == "await");

        let specifier = self.imports.get(root);
        let is_external = specifier.map_or(false, |s| !s.starts_with('.'));
        let external_module = specifier.filter(|s| !s.starts_with('.')).cloned();

        let owner = self.owner();
        self.out.effects.push(self.ctx.new_effect(
            &owner,
            classify_call(&callee_name, is_external, is_awaited, external_module),
            node,
        ));

        if function.kind() == "identifier" && !BUILTIN_GLOBALS.contains(&callee_name.as_str()) {
            self.out.edges.push(self.ctx.new_edge(
                &owner,
                &unresolved_target(&callee_name),
                EdgeKind::Calls,
                Some(node),
            ));
        }
    }
}

/// First statement of a definition body, when it is a bare string.
fn docstring(node: Node, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() == "string" {
        Some(node_text(expr, source).trim_matches(|c| c == '"' || c == '\'').to_string())
    } else {
        None
    }
}

impl LanguageParser for PythonParser {
    fn parse(&self, file_path: &Path, content: &[u8], cfg: &ParserConfig) -> devac_core::Result<ParseResult> {
        let started = Instant::now();
        let ctx = FileContext::new(cfg, file_path, content);
        let mut out = ParseResult {
            source_file_hash: ctx.source_file_hash.clone(),
            ..Default::default()
        };

        let Ok(source) = std::str::from_utf8(content) else {
            out.warnings.push(format!("{}: not valid UTF-8, skipped", ctx.rel_path));
            return Ok(out);
        };

        let parsed = match self.pool.parse_blocking(ParseRequest {
            grammar: Grammar::Python,
            content: source.to_string(),
            path: file_path.to_path_buf(),
        }) {
            Ok(parsed) => parsed,
            Err(e) => {
                out.warnings.push(format!("{}: parse failed: {e}", ctx.rel_path));
                return Ok(out);
            }
        };

        let tree = parsed.tree;
        if tree.root_node().has_error() {
            out.warnings
                .push(format!("{}: syntax errors, partial extraction", ctx.rel_path));
        }

        let module_id = ctx.module_id();
        out.nodes.push(ctx.module_node());

        let mut walker = Walker {
            ctx: &ctx,
            out: &mut out,
            source: source.as_bytes(),
            module_id: module_id.clone(),
            owner_stack: Vec::new(),
            imports: HashMap::new(),
            top_level: Vec::new(),
        };
        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            walker.visit(child, None);
        }
        let top_level = std::mem::take(&mut walker.top_level);

        let defines: Vec<_> = top_level
            .iter()
            .map(|entity| ctx.new_edge(&module_id, entity, EdgeKind::Defines, None))
            .collect();
        out.edges.extend(defines);

        bind_local_targets(&out.nodes, &mut out.edges);
        out.parse_time_ms = started.elapsed().as_millis() as u64;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;
    use devac_core::{EffectPayload, NodeKind};

    fn parse(code: &str, file: &str) -> ParseResult {
        let parser = PythonParser::new(create_parser_pool());
        let cfg = ParserConfig::new("repo", ".", "base");
        parser.parse(Path::new(file), code.as_bytes(), &cfg).unwrap()
    }

    #[test]
    fn test_extract_defs_and_classes() {
        let code = r#"
import requests
from .helpers import slugify

MAX_RETRIES = 3

class Fetcher(BaseClient):
    """Fetches documents."""

    def fetch(self, url):
        return requests.get(url)

    def _retry(self):
        pass

async def run(url):
    f = Fetcher()
    return f.fetch(url)
"#;
        let result = parse(code, "pkg/fetcher.py");

        let class = result.nodes.iter().find(|n| n.name == "Fetcher").unwrap();
        assert_eq!(class.kind, NodeKind::Class);
        assert!(class.doc.as_deref().unwrap_or("").contains("Fetches documents"));

        let method = result.nodes.iter().find(|n| n.name == "fetch").unwrap();
        assert_eq!(method.kind, NodeKind::Method);

        let private = result.nodes.iter().find(|n| n.name == "_retry").unwrap();
        assert_eq!(private.visibility, Some(devac_core::Visibility::Private));

        let func = result.nodes.iter().find(|n| n.name == "run").unwrap();
        assert_eq!(func.kind, NodeKind::Function);
        assert!(func.is_async);
        assert!(func.is_exported);

        let constant = result.nodes.iter().find(|n| n.name == "MAX_RETRIES").unwrap();
        assert_eq!(constant.kind, NodeKind::Constant);

        let extends = result
            .edges
            .iter()
            .find(|e| e.edge_type == devac_core::EdgeKind::Extends)
            .unwrap();
        assert_eq!(extends.target_entity_id, "unresolved:BaseClient");

        let relative = result
            .external_refs
            .iter()
            .find(|r| r.module_specifier == ".helpers")
            .unwrap();
        assert_eq!(relative.imported_symbol, "slugify");
        assert!(relative.is_relative());
    }

    #[test]
    fn test_external_call_tagging() {
        let code = "import requests\n\ndef ping():\n    return requests.get('https://x')\n";
        let result = parse(code, "pkg/ping.py");
        let send = result
            .effects
            .iter()
            .find(|e| matches!(e.payload, EffectPayload::Send { .. }))
            .expect("requests.get classified as Send");
        match &send.payload {
            EffectPayload::Send { is_third_party, .. } => assert!(is_third_party),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_builtin_calls_skip_edges() {
        let code = "def shout(msg):\n    print(len(msg))\n";
        let result = parse(code, "pkg/shout.py");
        assert!(
            result
                .edges
                .iter()
                .all(|e| e.edge_type != devac_core::EdgeKind::Calls)
        );
        assert_eq!(result.effects.len(), 2);
    }

    #[test]
    fn test_decorated_function() {
        let code = "@staticmethod\ndef helper():\n    pass\n";
        let result = parse(code, "pkg/util.py");
        let helper = result.nodes.iter().find(|n| n.name == "helper").unwrap();
        assert_eq!(helper.decorators, vec!["staticmethod".to_string()]);
        assert!(helper.is_static);
    }
}
