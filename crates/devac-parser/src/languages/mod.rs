//! Language parsers and shared extraction helpers

pub mod csharp;
pub mod python;
pub mod typescript;

use crate::parser_pool::ParserPool;
use crate::{LanguageParser, ParserConfig};
use devac_core::{
    EdgeKind, EdgeRecord, EffectPayload, EffectRecord, Language, NodeKind, NodeRecord,
    UNRESOLVED_PREFIX, identity, normalize_path,
};
use std::path::Path;
use tree_sitter::{Node, Point};

/// Build the parser for a detected language.
pub fn parser_for(language: Language, pool: ParserPool) -> Box<dyn LanguageParser> {
    match language {
        Language::TypeScript | Language::JavaScript => {
            Box::new(typescript::TypeScriptParser::new(pool))
        }
        Language::Python => Box::new(python::PythonParser::new(pool)),
        Language::CSharp => Box::new(csharp::CSharpParser::new(pool)),
    }
}

pub(crate) fn point_to_u32(point: Point) -> u32 {
    (point.row as u32) + 1
}

pub(crate) fn column_to_u32(point: Point) -> u32 {
    point.column as u32
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Find the first direct child of a given kind.
pub(crate) fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Whether any direct child is the given anonymous token ("async", "static", …).
pub(crate) fn has_token_child(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == token)
}

/// Per-file extraction context: identity inputs and record stamps shared by
/// every record a file produces.
pub(crate) struct FileContext<'a> {
    pub cfg: &'a ParserConfig,
    /// Forward-slash file path relative to the package root.
    pub rel_path: String,
    pub source_file_hash: String,
    pub updated_at: i64,
}

impl<'a> FileContext<'a> {
    pub fn new(cfg: &'a ParserConfig, file_path: &Path, content: &[u8]) -> Self {
        FileContext {
            cfg,
            rel_path: normalize_path(file_path),
            source_file_hash: identity::content_hash(content),
            updated_at: devac_core::now_millis(),
        }
    }

    pub fn entity_id(&self, kind: NodeKind, qualified_name: &str, disambiguator: &str) -> String {
        identity::entity_id(
            &self.cfg.repo_name,
            &self.cfg.package_path,
            Path::new(&self.rel_path),
            kind,
            qualified_name,
            disambiguator,
        )
    }

    /// Qualified name of a top-level symbol: `<file>::<name>`.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}::{}", self.rel_path, name)
    }

    /// The file's module entity id.
    pub fn module_id(&self) -> String {
        self.entity_id(NodeKind::Module, &self.rel_path, "")
    }

    /// The module node every file contributes.
    pub fn module_node(&self) -> NodeRecord {
        let name = Path::new(&self.rel_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.rel_path.clone());
        NodeRecord {
            entity_id: self.module_id(),
            name,
            qualified_name: self.rel_path.clone(),
            kind: NodeKind::Module,
            file_path: self.rel_path.clone(),
            start_line: 1,
            end_line: 1,
            start_column: 0,
            end_column: 0,
            is_exported: false,
            is_default_export: false,
            visibility: None,
            is_async: false,
            is_generator: false,
            is_static: false,
            is_abstract: false,
            signature: None,
            doc: None,
            decorators: Vec::new(),
            type_parameters: Vec::new(),
            source_file_hash: self.source_file_hash.clone(),
            branch: self.cfg.branch.clone(),
            is_deleted: false,
            updated_at: self.updated_at,
        }
    }

    /// A node record with location and stamps filled in; callers set flags.
    pub fn new_node(&self, kind: NodeKind, name: &str, qualified_name: &str, node: Node) -> NodeRecord {
        NodeRecord {
            entity_id: self.entity_id(kind, qualified_name, ""),
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            kind,
            file_path: self.rel_path.clone(),
            start_line: point_to_u32(node.start_position()),
            end_line: point_to_u32(node.end_position()),
            start_column: column_to_u32(node.start_position()),
            end_column: column_to_u32(node.end_position()),
            is_exported: false,
            is_default_export: false,
            visibility: None,
            is_async: false,
            is_generator: false,
            is_static: false,
            is_abstract: false,
            signature: None,
            doc: None,
            decorators: Vec::new(),
            type_parameters: Vec::new(),
            source_file_hash: self.source_file_hash.clone(),
            branch: self.cfg.branch.clone(),
            is_deleted: false,
            updated_at: self.updated_at,
        }
    }

    pub fn new_edge(&self, source: &str, target: &str, kind: EdgeKind, node: Option<Node>) -> EdgeRecord {
        EdgeRecord {
            source_entity_id: source.to_string(),
            target_entity_id: target.to_string(),
            edge_type: kind,
            file_path: Some(self.rel_path.clone()),
            line: node.map(|n| point_to_u32(n.start_position())),
            column: node.map(|n| column_to_u32(n.start_position())),
            properties: None,
            source_file_hash: self.source_file_hash.clone(),
            branch: self.cfg.branch.clone(),
            is_deleted: false,
            updated_at: self.updated_at,
        }
    }

    pub fn new_effect(&self, source_entity_id: &str, payload: EffectPayload, node: Node) -> EffectRecord {
        let line = point_to_u32(node.start_position());
        let column = column_to_u32(node.start_position());
        EffectRecord {
            effect_id: identity::effect_id(
                source_entity_id,
                payload.effect_type(),
                &self.rel_path,
                line,
                column,
            ),
            source_entity_id: source_entity_id.to_string(),
            payload,
            file_path: self.rel_path.clone(),
            line,
            column,
            branch: self.cfg.branch.clone(),
            is_deleted: false,
            updated_at: self.updated_at,
        }
    }
}

/// Member-call method names that read from a resource.
const RETRIEVE_METHODS: &[&str] = &[
    "getItem", "find", "findOne", "findMany", "query", "select", "load", "read", "fetchOne",
];

/// Member-call method names that write to a resource.
const STORE_METHODS: &[&str] = &[
    "setItem", "save", "insert", "insertOne", "write", "update", "upsert", "create", "delete",
    "remove", "persist",
];

/// Callee prefixes that transmit data off-host.
const SEND_CALLEES: &[&str] = &["fetch", "axios", "http.request", "requests.", "HttpClient"];

/// Classify a call site into its raw effect payload. Domain classification
/// proper happens later in the rules engine; this only picks the effect
/// type from call shape.
pub(crate) fn classify_call(
    callee_name: &str,
    is_external: bool,
    is_async: bool,
    external_module: Option<String>,
) -> EffectPayload {
    let (object, method) = match callee_name.rsplit_once('.') {
        Some((obj, m)) => (obj, m),
        None => ("", callee_name),
    };

    if SEND_CALLEES.iter().any(|p| callee_name.starts_with(p)) {
        return EffectPayload::Send {
            target: callee_name.to_string(),
            is_third_party: is_external,
        };
    }
    if !object.is_empty() && STORE_METHODS.contains(&method) {
        return EffectPayload::Store {
            target_resource: object.to_string(),
            operation: method.to_string(),
        };
    }
    if !object.is_empty() && RETRIEVE_METHODS.contains(&method) {
        return EffectPayload::Retrieve {
            target_resource: object.to_string(),
            operation: method.to_string(),
        };
    }
    EffectPayload::FunctionCall {
        callee_name: callee_name.to_string(),
        is_external,
        is_async,
        external_module,
    }
}

/// Rebind `unresolved:<name>` edge targets to same-file entities where the
/// name matches a node extracted from this file. Cross-file names stay
/// unresolved for the semantic resolver.
pub(crate) fn bind_local_targets(nodes: &[NodeRecord], edges: &mut [EdgeRecord]) {
    use std::collections::HashMap;
    let mut by_name: HashMap<&str, &NodeRecord> = HashMap::new();
    for node in nodes {
        // First definition wins; overloads share a name and any of them is
        // an acceptable local bind target at this stage.
        by_name.entry(node.name.as_str()).or_insert(node);
    }
    for edge in edges.iter_mut() {
        if let Some(symbol) = edge.target_entity_id.strip_prefix(UNRESOLVED_PREFIX) {
            if let Some(node) = by_name.get(symbol) {
                edge.target_entity_id = node.entity_id.clone();
            }
        }
    }
}

/// Test-file recognition shared by the analyzer and parsers.
pub(crate) fn is_test_file(rel_path: &str) -> bool {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.starts_with("test_")
        || file_name.ends_with("_test.py")
        || file_name.ends_with("Tests.cs")
        || file_name.ends_with("Test.cs")
}
