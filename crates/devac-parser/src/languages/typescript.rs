//! TypeScript / JavaScript extraction using tree-sitter
//!
//! One grammar family covers `.ts`, `.tsx`, and the JavaScript variants;
//! type-only constructs simply never match on JS trees.

use super::{
    FileContext, bind_local_targets, child_of_kind, classify_call, has_token_child, node_text,
};
use crate::parser_pool::{Grammar, ParseRequest, ParserPool};
use crate::{LanguageParser, ParseResult, ParserConfig};
use devac_core::{EdgeKind, NodeKind, Visibility, unresolved_target};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tree_sitter::Node;

/// Globals never worth a CALLS edge; resolution skips them by contract.
const BUILTIN_GLOBALS: &[&str] = &[
    "console", "Math", "JSON", "Object", "Array", "Promise", "String", "Number", "Boolean",
    "Date", "RegExp", "Error", "Symbol", "Map", "Set", "WeakMap", "WeakSet", "Reflect", "Proxy",
    "globalThis", "window", "document", "process", "Buffer", "setTimeout", "setInterval",
    "clearTimeout", "clearInterval", "parseInt", "parseFloat", "isNaN", "structuredClone",
    "require",
];

pub struct TypeScriptParser {
    pool: ParserPool,
}

impl TypeScriptParser {
    pub fn new(pool: ParserPool) -> Self {
        Self { pool }
    }
}

/// One import binding in scope: local name → (module specifier, namespace?).
#[derive(Debug, Clone)]
struct ImportBinding {
    specifier: String,
    is_namespace: bool,
}

struct Walker<'a, 'cfg> {
    ctx: &'a FileContext<'cfg>,
    out: &'a mut ParseResult,
    source: &'a [u8],
    module_id: String,
    /// Entity ids of the lexically enclosing symbols; last is the current
    /// owner of calls and effects.
    owner_stack: Vec<String>,
    imports: HashMap<String, ImportBinding>,
    /// Names listed in `export { … }` clauses, applied after the walk.
    exported_names: HashSet<String>,
    /// Entity ids of top-level symbols, for DEFINES edges.
    top_level: Vec<String>,
}

impl<'a, 'cfg> Walker<'a, 'cfg> {
    fn owner(&self) -> &str {
        self.owner_stack.last().map(String::as_str).unwrap_or(&self.module_id)
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => {
                self.extract_import(node);
                return;
            }
            "export_statement" => {
                self.extract_export(node);
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                self.extract_function(node, false, false);
                return;
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.extract_class(node, false, false);
                return;
            }
            "interface_declaration" => {
                self.extract_interface(node, false);
                return;
            }
            "enum_declaration" => {
                self.extract_simple(node, NodeKind::Enum, false);
                return;
            }
            "type_alias_declaration" => {
                self.extract_simple(node, NodeKind::TypeAlias, false);
                return;
            }
            "lexical_declaration" | "variable_declaration" => {
                self.extract_variables(node, false, false);
                return;
            }
            "call_expression" => {
                self.extract_call(node);
                // Fall through to children: arguments may contain nested
                // calls and function expressions.
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn extract_import(&mut self, node: Node) {
        let Some(spec_node) = child_of_kind(node, "string") else {
            return;
        };
        let specifier = node_text(spec_node, self.source)
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        let is_type_only = has_token_child(node, "type");

        let push_ref = |walker: &mut Self, symbol: String, local: String, is_default: bool, is_namespace: bool| {
            walker.imports.insert(
                local,
                ImportBinding {
                    specifier: specifier.clone(),
                    is_namespace,
                },
            );
            walker.out.external_refs.push(devac_core::ExternalRefRecord {
                source_entity_id: walker.module_id.clone(),
                module_specifier: specifier.clone(),
                imported_symbol: symbol,
                is_type_only,
                is_default,
                is_namespace,
                file_path: walker.ctx.rel_path.clone(),
                line: super::point_to_u32(node.start_position()),
                column: super::column_to_u32(node.start_position()),
                is_resolved: false,
                target_entity_id: None,
                branch: walker.ctx.cfg.branch.clone(),
                is_deleted: false,
                updated_at: walker.ctx.updated_at,
            });
        };

        if let Some(clause) = child_of_kind(node, "import_clause") {
            let mut cursor = clause.walk();
            for child in clause.children(&mut cursor) {
                match child.kind() {
                    "identifier" => {
                        let local = node_text(child, self.source).to_string();
                        push_ref(self, "default".to_string(), local, true, false);
                    }
                    "namespace_import" => {
                        if let Some(name) = child_of_kind(child, "identifier") {
                            let local = node_text(name, self.source).to_string();
                            push_ref(self, "*".to_string(), local, false, true);
                        }
                    }
                    "named_imports" => {
                        let mut inner = child.walk();
                        for spec in child.children(&mut inner) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let name = spec
                                .child_by_field_name("name")
                                .map(|n| node_text(n, self.source).to_string());
                            let alias = spec
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, self.source).to_string());
                            if let Some(name) = name {
                                let local = alias.unwrap_or_else(|| name.clone());
                                push_ref(self, name, local, false, false);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // Side-effect imports (`import "./setup"`) still record the module
        // dependency itself.
        let mut edge = self.ctx.new_edge(
            &self.module_id,
            &unresolved_target(&specifier),
            EdgeKind::Imports,
            Some(node),
        );
        edge.properties = Some(serde_json::json!({ "specifier": specifier }).to_string());
        self.out.edges.push(edge);
    }

    fn extract_export(&mut self, node: Node) {
        let is_default = has_token_child(node, "default");
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    self.extract_function(child, true, is_default)
                }
                "class_declaration" | "abstract_class_declaration" => {
                    self.extract_class(child, true, is_default)
                }
                "interface_declaration" => self.extract_interface(child, true),
                "enum_declaration" => self.extract_simple(child, NodeKind::Enum, true),
                "type_alias_declaration" => self.extract_simple(child, NodeKind::TypeAlias, true),
                "lexical_declaration" | "variable_declaration" => {
                    self.extract_variables(child, true, is_default)
                }
                "export_clause" => {
                    let mut inner = child.walk();
                    for spec in child.children(&mut inner) {
                        if spec.kind() == "export_specifier" {
                            if let Some(name) = spec.child_by_field_name("name") {
                                self.exported_names
                                    .insert(node_text(name, self.source).to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn extract_function(&mut self, node: Node, exported: bool, is_default: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(NodeKind::Function, &name, &qualified, node);
        record.is_exported = exported;
        record.is_default_export = is_default;
        record.is_async = has_token_child(node, "async");
        record.is_generator = node.kind() == "generator_function_declaration" || has_token_child(node, "*");
        record.signature = signature_of(node, &name, self.source);
        record.doc = doc_comment(node, self.source);
        record.type_parameters = type_parameters(node, self.source);
        let entity = record.entity_id.clone();
        self.top_level.push(entity.clone());
        self.out.nodes.push(record);

        self.owner_stack.push(entity);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.owner_stack.pop();
    }

    fn extract_class(&mut self, node: Node, exported: bool, is_default: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(NodeKind::Class, &name, &qualified, node);
        record.is_exported = exported;
        record.is_default_export = is_default;
        record.is_abstract = node.kind() == "abstract_class_declaration" || has_token_child(node, "abstract");
        record.doc = doc_comment(node, self.source);
        record.decorators = decorators_of(node, self.source);
        record.type_parameters = type_parameters(node, self.source);
        let class_entity = record.entity_id.clone();
        self.top_level.push(class_entity.clone());
        self.out.nodes.push(record);

        // extends / implements clauses live under class_heritage.
        if let Some(heritage) = child_of_kind(node, "class_heritage") {
            let mut cursor = heritage.walk();
            for clause in heritage.children(&mut cursor) {
                let edge_kind = match clause.kind() {
                    "extends_clause" => EdgeKind::Extends,
                    "implements_clause" => EdgeKind::Implements,
                    _ => continue,
                };
                let mut inner = clause.walk();
                for parent in clause.children(&mut inner) {
                    if matches!(parent.kind(), "identifier" | "type_identifier" | "member_expression" | "generic_type") {
                        let parent_name = base_identifier(parent, self.source);
                        if parent_name.is_empty() {
                            continue;
                        }
                        self.out.edges.push(self.ctx.new_edge(
                            &class_entity,
                            &unresolved_target(&parent_name),
                            edge_kind,
                            Some(clause),
                        ));
                    }
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_definition" => self.extract_method(member, &name, &class_entity),
                    "public_field_definition" | "field_definition" => {
                        self.extract_property(member, &name, &class_entity)
                    }
                    _ => {}
                }
            }
        }
    }

    fn extract_method(&mut self, node: Node, class_name: &str, class_entity: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = format!("{}::{}::{}", self.ctx.rel_path, class_name, name);
        let mut record = self.ctx.new_node(NodeKind::Method, &name, &qualified, node);
        record.is_async = has_token_child(node, "async");
        record.is_static = has_token_child(node, "static");
        record.is_abstract = has_token_child(node, "abstract");
        record.is_generator = has_token_child(node, "*");
        record.visibility = accessibility(node, self.source);
        record.signature = signature_of(node, &name, self.source);
        record.doc = doc_comment(node, self.source);
        record.decorators = decorators_of(node, self.source);
        let entity = record.entity_id.clone();
        self.out.nodes.push(record);
        self.out.edges.push(self.ctx.new_edge(
            class_entity,
            &entity,
            EdgeKind::Defines,
            Some(node),
        ));

        self.owner_stack.push(entity);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.owner_stack.pop();
    }

    fn extract_property(&mut self, node: Node, class_name: &str, class_entity: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = format!("{}::{}::{}", self.ctx.rel_path, class_name, name);
        let mut record = self.ctx.new_node(NodeKind::Property, &name, &qualified, node);
        record.is_static = has_token_child(node, "static");
        record.visibility = accessibility(node, self.source);
        let entity = record.entity_id.clone();
        self.out.nodes.push(record);
        self.out.edges.push(self.ctx.new_edge(
            class_entity,
            &entity,
            EdgeKind::Defines,
            Some(node),
        ));
    }

    fn extract_interface(&mut self, node: Node, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(NodeKind::Interface, &name, &qualified, node);
        record.is_exported = exported;
        record.doc = doc_comment(node, self.source);
        record.type_parameters = type_parameters(node, self.source);
        let entity = record.entity_id.clone();
        self.top_level.push(entity.clone());
        self.out.nodes.push(record);

        // `interface A extends B, C`: each parent resolved independently.
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind().contains("extends") {
                let mut inner = child.walk();
                for parent in child.children(&mut inner) {
                    if matches!(parent.kind(), "identifier" | "type_identifier" | "generic_type") {
                        let parent_name = base_identifier(parent, self.source);
                        if !parent_name.is_empty() {
                            self.out.edges.push(self.ctx.new_edge(
                                &entity,
                                &unresolved_target(&parent_name),
                                EdgeKind::Extends,
                                Some(child),
                            ));
                        }
                    }
                }
            }
        }
    }

    fn extract_simple(&mut self, node: Node, kind: NodeKind, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&name);
        let mut record = self.ctx.new_node(kind, &name, &qualified, node);
        record.is_exported = exported;
        record.doc = doc_comment(node, self.source);
        self.top_level.push(record.entity_id.clone());
        self.out.nodes.push(record);
    }

    /// `const x = …` at module level. Arrow-function initializers become
    /// Function nodes; everything else under `const` becomes a Constant.
    fn extract_variables(&mut self, node: Node, exported: bool, is_default: bool) {
        let top_level = self.owner_stack.len() <= 1;
        let is_const = has_token_child(node, "const");
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue; // destructuring patterns don't yield one symbol
            }
            let name = node_text(name_node, self.source).to_string();
            let value = declarator.child_by_field_name("value");
            let is_function_value = value.map_or(false, |v| {
                matches!(v.kind(), "arrow_function" | "function_expression" | "function")
            });

            if is_function_value {
                let qualified = self.ctx.qualify(&name);
                let value_node = value.unwrap_or(declarator);
                let mut record = self.ctx.new_node(NodeKind::Function, &name, &qualified, declarator);
                record.is_exported = exported;
                record.is_default_export = is_default;
                record.is_async = has_token_child(value_node, "async");
                record.doc = doc_comment(node, self.source);
                let entity = record.entity_id.clone();
                if top_level {
                    self.top_level.push(entity.clone());
                }
                self.out.nodes.push(record);
                self.owner_stack.push(entity);
                if let Some(body) = value_node.child_by_field_name("body") {
                    self.visit_children(body);
                }
                self.owner_stack.pop();
            } else if top_level && is_const {
                let qualified = self.ctx.qualify(&name);
                let mut record = self.ctx.new_node(NodeKind::Constant, &name, &qualified, declarator);
                record.is_exported = exported;
                record.is_default_export = is_default;
                self.top_level.push(record.entity_id.clone());
                self.out.nodes.push(record);
                if let Some(v) = value {
                    self.visit(v);
                }
            } else if let Some(v) = value {
                self.visit(v);
            }
        }
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
        let is_awaited = node.parent().map_or(false, |p| p.kind() == "await_expression");

        let binding = self.imports.get(root);
        let is_external = binding.map_or(false, |b| !b.specifier.starts_with('.'));
        let external_module = binding
            .filter(|b| !b.specifier.starts_with('.'))
            .map(|b| b.specifier.clone());

        let owner = self.owner().to_string();
        self.out.effects.push(self.ctx.new_effect(
            &owner,
            classify_call(&callee_name, is_external, is_awaited, external_module),
            node,
        ));

        // CALLS edges only for plain identifier callees; member calls are
        // observed as effects but not resolved as graph edges.
        if function.kind() == "identifier" && !BUILTIN_GLOBALS.contains(&callee_name.as_str()) {
            self.out.edges.push(self.ctx.new_edge(
                &owner,
                &unresolved_target(&callee_name),
                EdgeKind::Calls,
                Some(node),
            ));
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }
}

/// `name(params): ret` rendered from the declaration's own children.
fn signature_of(node: Node, name: &str, source: &[u8]) -> Option<String> {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source).to_string())?;
    let ret = node
        .child_by_field_name("return_type")
        .map(|r| node_text(r, source).to_string())
        .unwrap_or_default();
    Some(format!("{name}{params}{ret}"))
}

/// Leading `/** … */` comment directly above a declaration. For exported
/// declarations the comment precedes the wrapping export statement.
fn doc_comment(node: Node, source: &[u8]) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let mut prev = anchor.prev_sibling();
    // Skip decorators between the doc comment and the declaration.
    while let Some(p) = prev {
        if p.kind() == "decorator" {
            prev = p.prev_sibling();
        } else {
            break;
        }
    }
    let prev = prev?;
    if prev.kind() == "comment" {
        let text = node_text(prev, source);
        if text.starts_with("/**") {
            return Some(text.to_string());
        }
    }
    None
}

fn decorators_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            out.push(node_text(child, source).trim_start_matches('@').to_string());
        }
    }
    // Decorators may also precede the declaration as siblings.
    let mut prev = node.prev_sibling();
    while let Some(p) = prev {
        if p.kind() == "decorator" {
            out.push(node_text(p, source).trim_start_matches('@').to_string());
            prev = p.prev_sibling();
        } else {
            break;
        }
    }
    out
}

fn type_parameters(node: Node, source: &[u8]) -> Vec<String> {
    let Some(params) = child_of_kind(node, "type_parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "type_parameter" {
            if let Some(name) = child_of_kind(child, "type_identifier") {
                out.push(node_text(name, source).to_string());
            }
        }
    }
    out
}

fn accessibility(node: Node, source: &[u8]) -> Option<Visibility> {
    let modifier = child_of_kind(node, "accessibility_modifier")?;
    Visibility::parse_visibility(node_text(modifier, source))
}

/// The leftmost identifier of a possibly-generic, possibly-qualified type
/// expression (`Base<T>` → `Base`, `ns.Base` → `ns.Base`).
fn base_identifier(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

impl LanguageParser for TypeScriptParser {
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

        let grammar = Grammar::from_path(file_path).unwrap_or(Grammar::TypeScript);
        let parsed = match self.pool.parse_blocking(ParseRequest {
            grammar,
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
            owner_stack: vec![module_id.clone()],
            imports: HashMap::new(),
            exported_names: HashSet::new(),
            top_level: Vec::new(),
        };
        walker.visit_children(tree.root_node());

        let exported_names = std::mem::take(&mut walker.exported_names);
        let top_level = std::mem::take(&mut walker.top_level);

        for node in out.nodes.iter_mut() {
            if exported_names.contains(&node.name) {
                node.is_exported = true;
            }
        }
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
        let parser = TypeScriptParser::new(create_parser_pool());
        let cfg = ParserConfig::new("repo", ".", "base");
        parser.parse(Path::new(file), code.as_bytes(), &cfg).unwrap()
    }

    #[test]
    fn test_extract_functions_and_classes() {
        let code = r#"
import { Repo } from './repo';
import express from 'express';

/** Creates a user. */
export async function createUser(name: string): Promise<void> {
    const repo = new Repo();
    await repo.save(name);
}

export class UserService extends BaseService implements Service {
    private repo: Repo;

    async getUser(id: string) {
        return this.repo.findOne(id);
    }
}

export const MAX_USERS = 100;
"#;
        let result = parse(code, "src/users.ts");

        let func = result
            .nodes
            .iter()
            .find(|n| n.name == "createUser")
            .expect("createUser extracted");
        assert_eq!(func.kind, NodeKind::Function);
        assert!(func.is_exported);
        assert!(func.is_async);
        assert!(func.doc.as_deref().unwrap_or("").contains("Creates a user"));

        let class = result.nodes.iter().find(|n| n.name == "UserService").unwrap();
        assert_eq!(class.kind, NodeKind::Class);

        let method = result.nodes.iter().find(|n| n.name == "getUser").unwrap();
        assert_eq!(method.kind, NodeKind::Method);
        assert!(method.is_async);

        let constant = result.nodes.iter().find(|n| n.name == "MAX_USERS").unwrap();
        assert_eq!(constant.kind, NodeKind::Constant);
        assert!(constant.is_exported);

        // Two import statements → two refs (default + named).
        assert_eq!(result.external_refs.len(), 2);
        let named = result
            .external_refs
            .iter()
            .find(|r| r.imported_symbol == "Repo")
            .unwrap();
        assert_eq!(named.module_specifier, "./repo");
        assert!(!named.is_default);
        let default = result
            .external_refs
            .iter()
            .find(|r| r.imported_symbol == "default")
            .unwrap();
        assert_eq!(default.module_specifier, "express");
    }

    #[test]
    fn test_extends_edges_unresolved() {
        let code = "class Child extends Parent {}\n";
        let result = parse(code, "src/child.ts");
        let extends = result
            .edges
            .iter()
            .find(|e| e.edge_type == devac_core::EdgeKind::Extends)
            .expect("extends edge");
        assert_eq!(extends.target_entity_id, "unresolved:Parent");
    }

    #[test]
    fn test_local_calls_bind_in_file() {
        let code = r#"
function helper() {}
export function main() {
    helper();
}
"#;
        let result = parse(code, "src/main.ts");
        let call = result
            .edges
            .iter()
            .find(|e| e.edge_type == devac_core::EdgeKind::Calls)
            .expect("call edge");
        let helper = result.nodes.iter().find(|n| n.name == "helper").unwrap();
        assert_eq!(call.target_entity_id, helper.entity_id);
    }

    #[test]
    fn test_external_call_effect_tagging() {
        let code = r#"
import axios from 'axios';
export async function ping() {
    await axios.get('https://example.com');
}
"#;
        let result = parse(code, "src/ping.ts");
        let send = result
            .effects
            .iter()
            .find(|e| matches!(e.payload, EffectPayload::Send { .. }))
            .expect("axios call classified as Send");
        match &send.payload {
            EffectPayload::Send { is_third_party, .. } => assert!(is_third_party),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_builtins_skip_call_edges() {
        let code = "export function log() { console.log('x'); }\n";
        let result = parse(code, "src/log.ts");
        assert!(
            result
                .edges
                .iter()
                .all(|e| e.edge_type != devac_core::EdgeKind::Calls),
            "console.* must not produce CALLS edges"
        );
        // The observation itself is still recorded as an effect.
        assert_eq!(result.effects.len(), 1);
    }

    #[test]
    fn test_unparseable_file_yields_warning_not_error() {
        let result = parse("export function {{{{", "src/broken.ts");
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_arrow_function_const_is_function() {
        let code = "export const handler = async (req: Request) => { return null; };\n";
        let result = parse(code, "src/handler.ts");
        let handler = result.nodes.iter().find(|n| n.name == "handler").unwrap();
        assert_eq!(handler.kind, NodeKind::Function);
        assert!(handler.is_async);
        assert!(handler.is_exported);
    }
}
