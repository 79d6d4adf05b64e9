//! C# extraction using tree-sitter

use super::{
    FileContext, bind_local_targets, classify_call, column_to_u32, node_text, point_to_u32,
};
use crate::parser_pool::{Grammar, ParseRequest, ParserPool};
use crate::{LanguageParser, ParseResult, ParserConfig};
use devac_core::{EdgeKind, NodeKind, Visibility, unresolved_target};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tree_sitter::Node;

const BUILTIN_GLOBALS: &[&str] = &[
    "Console", "Math", "String", "Convert", "Task", "Guid", "DateTime", "TimeSpan", "Enumerable",
    "Array", "Activator", "Environment", "Path", "File", "Directory", "Object", "nameof",
];

pub struct CSharpParser {
    pool: ParserPool,
}

impl CSharpParser {
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
    /// Last namespace segment → full namespace, from using directives.
    usings: HashMap<String, String>,
    top_level: Vec<String>,
}

impl<'a, 'cfg> Walker<'a, 'cfg> {
    fn owner(&self) -> String {
        self.owner_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.module_id.clone())
    }

    fn visit(&mut self, node: Node, namespace: &str) {
        match node.kind() {
            "using_directive" => {
                self.extract_using(node);
                return;
            }
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                let ns = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source).to_string())
                    .unwrap_or_default();
                let nested = if namespace.is_empty() {
                    ns
                } else {
                    format!("{namespace}.{ns}")
                };
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.visit(child, &nested);
                }
                return;
            }
            "class_declaration" | "record_declaration" | "struct_declaration" => {
                self.extract_type(node, namespace, NodeKind::Class);
                return;
            }
            "interface_declaration" => {
                self.extract_type(node, namespace, NodeKind::Interface);
                return;
            }
            "enum_declaration" => {
                self.extract_enum(node, namespace);
                return;
            }
            "invocation_expression" => {
                self.extract_call(node);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, namespace);
        }
    }

    fn extract_using(&mut self, node: Node) {
        let Some(name) = node
            .child_by_field_name("name")
            .or_else(|| super::child_of_kind(node, "qualified_name"))
            .or_else(|| super::child_of_kind(node, "identifier"))
        else {
            return;
        };
        let namespace = node_text(name, self.source).to_string();
        let last = namespace.rsplit('.').next().unwrap_or(&namespace).to_string();
        self.usings.insert(last, namespace.clone());
        self.out.external_refs.push(devac_core::ExternalRefRecord {
            source_entity_id: self.module_id.clone(),
            module_specifier: namespace.clone(),
            imported_symbol: "*".to_string(),
            is_type_only: false,
            is_default: false,
            is_namespace: true,
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
            &unresolved_target(&namespace),
            EdgeKind::Imports,
            Some(node),
        );
        edge.properties = Some(serde_json::json!({ "specifier": namespace }).to_string());
        self.out.edges.push(edge);
    }

    fn extract_type(&mut self, node: Node, namespace: &str, kind: NodeKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let full_name = if namespace.is_empty() {
            name.clone()
        } else {
            format!("{namespace}.{name}")
        };
        let qualified = self.ctx.qualify(&full_name);
        let mut record = self.ctx.new_node(kind, &name, &qualified, node);
        let modifiers = modifiers_of(node, self.source);
        record.visibility = visibility_of(&modifiers);
        record.is_exported = modifiers.iter().any(|m| m == "public");
        record.is_abstract = modifiers.iter().any(|m| m == "abstract");
        record.is_static = modifiers.iter().any(|m| m == "static");
        record.doc = doc_comment(node, self.source);
        record.decorators = attributes_of(node, self.source);
        record.type_parameters = type_parameters(node, self.source);
        let type_entity = record.entity_id.clone();
        self.top_level.push(type_entity.clone());
        self.out.nodes.push(record);

        // C# syntax does not distinguish the base class from
        // interfaces; the I-prefix convention decides.
        if let Some(bases) = super::child_of_kind(node, "base_list") {
            let mut cursor = bases.walk();
            for base in bases.children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "qualified_name" | "generic_name") {
                    let base_name = base_type_name(base, self.source);
                    if base_name.is_empty() {
                        continue;
                    }
                    let edge_kind = if kind == NodeKind::Interface || !looks_like_interface(&base_name) {
                        EdgeKind::Extends
                    } else {
                        EdgeKind::Implements
                    };
                    self.out.edges.push(self.ctx.new_edge(
                        &type_entity,
                        &unresolved_target(&base_name),
                        edge_kind,
                        Some(bases),
                    ));
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_declaration" | "constructor_declaration" => {
                        self.extract_method(member, &full_name, &type_entity)
                    }
                    "property_declaration" => {
                        self.extract_property(member, &full_name, &type_entity)
                    }
                    "class_declaration" | "interface_declaration" | "enum_declaration"
                    | "record_declaration" | "struct_declaration" => {
                        let nested_ns = if namespace.is_empty() {
                            name.clone()
                        } else {
                            format!("{namespace}.{name}")
                        };
                        self.visit(member, &nested_ns);
                    }
                    _ => {}
                }
            }
        }
    }

    fn extract_method(&mut self, node: Node, type_name: &str, type_entity: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&format!("{type_name}.{name}"));
        // Overloads share a qualified name; the parameter list text keeps
        // their entity ids distinct.
        let params = node
            .child_by_field_name("parameters")
            .map(|p| node_text(p, self.source).to_string())
            .unwrap_or_default();
        let mut record = self.ctx.new_node(NodeKind::Method, &name, &qualified, node);
        record.entity_id = self.ctx.entity_id(NodeKind::Method, &qualified, &params);
        let modifiers = modifiers_of(node, self.source);
        record.visibility = visibility_of(&modifiers);
        record.is_static = modifiers.iter().any(|m| m == "static");
        record.is_abstract = modifiers.iter().any(|m| m == "abstract");
        record.is_async = modifiers.iter().any(|m| m == "async");
        record.signature = Some(format!("{name}{params}"));
        record.doc = doc_comment(node, self.source);
        record.decorators = attributes_of(node, self.source);
        let entity = record.entity_id.clone();
        self.out.nodes.push(record);
        self.out.edges.push(self.ctx.new_edge(
            type_entity,
            &entity,
            EdgeKind::Defines,
            Some(node),
        ));

        self.owner_stack.push(entity);
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.visit(child, "");
            }
        }
        self.owner_stack.pop();
    }

    fn extract_property(&mut self, node: Node, type_name: &str, type_entity: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified = self.ctx.qualify(&format!("{type_name}.{name}"));
        let mut record = self.ctx.new_node(NodeKind::Property, &name, &qualified, node);
        let modifiers = modifiers_of(node, self.source);
        record.visibility = visibility_of(&modifiers);
        record.is_static = modifiers.iter().any(|m| m == "static");
        let entity = record.entity_id.clone();
        self.out.nodes.push(record);
        self.out.edges.push(self.ctx.new_edge(
            type_entity,
            &entity,
            EdgeKind::Defines,
            Some(node),
        ));
    }

    fn extract_enum(&mut self, node: Node, namespace: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let full_name = if namespace.is_empty() {
            name.clone()
        } else {
            format!("{namespace}.{name}")
        };
        let qualified = self.ctx.qualify(&full_name);
        let mut record = self.ctx.new_node(NodeKind::Enum, &name, &qualified, node);
        let modifiers = modifiers_of(node, self.source);
        record.visibility = visibility_of(&modifiers);
        record.is_exported = modifiers.iter().any(|m| m == "public");
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
        let is_awaited = node.parent().map_or(false, |p| p.kind() == "await_expression");

        let namespace = self.usings.get(root);
        let is_external = namespace.is_some();
        let external_module = namespace.cloned();

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

/// Modifier tokens of a declaration (`public`, `static`, `async`, …).
fn modifiers_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifier" {
            out.push(node_text(child, source).to_string());
        } else if matches!(
            child.kind(),
            "public" | "private" | "protected" | "internal" | "static" | "abstract" | "async"
        ) {
            out.push(child.kind().to_string());
        }
    }
    out
}

fn visibility_of(modifiers: &[String]) -> Option<Visibility> {
    for m in modifiers {
        match m.as_str() {
            "public" => return Some(Visibility::Public),
            "protected" => return Some(Visibility::Protected),
            "private" => return Some(Visibility::Private),
            _ => {}
        }
    }
    None
}

/// `[Route("/users")]` attribute lists on a declaration.
fn attributes_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "attribute_list" {
            let mut inner = child.walk();
            for attr in child.children(&mut inner) {
                if attr.kind() == "attribute" {
                    out.push(node_text(attr, source).to_string());
                }
            }
        }
    }
    out
}

fn type_parameters(node: Node, source: &[u8]) -> Vec<String> {
    let Some(params) = super::child_of_kind(node, "type_parameter_list") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "type_parameter" {
            out.push(node_text(child, source).to_string());
        }
    }
    out
}

/// `/// <summary>…` XML doc block directly above a declaration.
fn doc_comment(node: Node, source: &[u8]) -> Option<String> {
    let prev = node.prev_sibling()?;
    if prev.kind() == "comment" {
        let text = node_text(prev, source);
        if text.starts_with("///") {
            return Some(text.to_string());
        }
    }
    None
}

fn base_type_name(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "generic_name" => node
            .named_child(0)
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

/// `IAudited`, `IDisposable`: the I-prefix naming convention.
fn looks_like_interface(name: &str) -> bool {
    let simple = name.rsplit('.').next().unwrap_or(name);
    let mut chars = simple.chars();
    chars.next() == Some('I') && chars.next().map_or(false, |c| c.is_ascii_uppercase())
}

impl LanguageParser for CSharpParser {
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
            grammar: Grammar::CSharp,
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
            usings: HashMap::new(),
            top_level: Vec::new(),
        };
        // A file-scoped namespace (`namespace X;`) scopes the declarations
        // that follow it as siblings, so the prefix is tracked across the
        // top-level iteration.
        let root = tree.root_node();
        let mut cursor = root.walk();
        let mut file_namespace = String::new();
        for child in root.children(&mut cursor) {
            if child.kind() == "file_scoped_namespace_declaration" {
                if let Some(name) = child.child_by_field_name("name") {
                    file_namespace = node_text(name, source.as_bytes()).to_string();
                }
                walker.visit(child, "");
            } else {
                walker.visit(child, &file_namespace);
            }
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
