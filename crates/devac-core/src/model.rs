//! Core record types for the analysis pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reserved branch name for the stable partition.
pub const BRANCH_BASE: &str = "base";

/// Sentinel prefix for edge targets awaiting semantic resolution.
pub const UNRESOLVED_PREFIX: &str = "unresolved:";

/// Build an unresolved edge target for a symbol name.
pub fn unresolved_target(symbol: &str) -> String {
    format!("{UNRESOLVED_PREFIX}{symbol}")
}

/// Current UTC time as epoch milliseconds, used for `updated_at` stamps.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Discriminates what kind of source symbol a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Function,
    Method,
    Class,
    Interface,
    Enum,
    TypeAlias,
    Constant,
    Property,
    Parameter,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::TypeAlias => "type_alias",
            Self::Constant => "constant",
            Self::Property => "property",
            Self::Parameter => "parameter",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "module" => Some(Self::Module),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "enum" => Some(Self::Enum),
            "type_alias" => Some(Self::TypeAlias),
            "constant" => Some(Self::Constant),
            "property" => Some(Self::Property),
            "parameter" => Some(Self::Parameter),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol visibility as declared in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }

    pub fn parse_visibility(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "protected" => Some(Self::Protected),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Calls,
    Imports,
    Extends,
    Implements,
    References,
    Defines,
    Exports,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
            Self::Extends => "EXTENDS",
            Self::Implements => "IMPLEMENTS",
            Self::References => "REFERENCES",
            Self::Defines => "DEFINES",
            Self::Exports => "EXPORTS",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "CALLS" => Some(Self::Calls),
            "IMPORTS" => Some(Self::Imports),
            "EXTENDS" => Some(Self::Extends),
            "IMPLEMENTS" => Some(Self::Implements),
            "REFERENCES" => Some(Self::References),
            "DEFINES" => Some(Self::Defines),
            "EXPORTS" => Some(Self::Exports),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Languages this analyzer parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    CSharp,
}

impl Language {
    /// Detect language from file extension. Returns `None` for files the
    /// pipeline does not analyze.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") | Some("tsx") | Some("mts") | Some("cts") => Some(Language::TypeScript),
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Some(Language::JavaScript),
            Some("py") | Some("pyi") => Some(Language::Python),
            Some("cs") => Some(Language::CSharp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::CSharp => "csharp",
        }
    }
}

/// One source-defined symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub entity_id: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: NodeKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub is_exported: bool,
    pub is_default_export: bool,
    pub visibility: Option<Visibility>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub decorators: Vec<String>,
    pub type_parameters: Vec<String>,
    pub source_file_hash: String,
    pub branch: String,
    pub is_deleted: bool,
    pub updated_at: i64,
}

/// A directed relationship between two entities. The target may carry the
/// `unresolved:` sentinel until the semantic resolver rebinds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeRecord {
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub edge_type: EdgeKind,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Free-form JSON properties, serialized at the storage boundary.
    pub properties: Option<String>,
    pub source_file_hash: String,
    pub branch: String,
    pub is_deleted: bool,
    pub updated_at: i64,
}

impl EdgeRecord {
    /// Primary key: (source, target, edge_type).
    pub fn key(&self) -> (String, String, String) {
        (
            self.source_entity_id.clone(),
            self.target_entity_id.clone(),
            self.edge_type.as_str().to_string(),
        )
    }

    pub fn is_unresolved(&self) -> bool {
        self.target_entity_id.starts_with(UNRESOLVED_PREFIX)
    }

    /// The bare symbol behind an `unresolved:` target, if any.
    pub fn unresolved_symbol(&self) -> Option<&str> {
        self.target_entity_id.strip_prefix(UNRESOLVED_PREFIX)
    }
}

/// An import site awaiting cross-file binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalRefRecord {
    pub source_entity_id: String,
    pub module_specifier: String,
    /// Named symbol, `default`, or `*`.
    pub imported_symbol: String,
    pub is_type_only: bool,
    pub is_default: bool,
    pub is_namespace: bool,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub is_resolved: bool,
    pub target_entity_id: Option<String>,
    pub branch: String,
    pub is_deleted: bool,
    pub updated_at: i64,
}

impl ExternalRefRecord {
    /// Primary key: (source, module specifier, imported symbol).
    pub fn key(&self) -> (String, String, String) {
        (
            self.source_entity_id.clone(),
            self.module_specifier.clone(),
            self.imported_symbol.clone(),
        )
    }

    /// A relative specifier (`./x`, `../y`, Python's `.mod`) binds within
    /// the package; anything else is an external dependency.
    pub fn is_relative(&self) -> bool {
        self.module_specifier.starts_with('.')
    }
}

/// Type-dependent payload of a side-effect observation. Serialized as a
/// tagged JSON object at the storage boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "effect_type")]
pub enum EffectPayload {
    FunctionCall {
        callee_name: String,
        is_external: bool,
        is_async: bool,
        external_module: Option<String>,
    },
    Store {
        target_resource: String,
        operation: String,
    },
    Retrieve {
        target_resource: String,
        operation: String,
    },
    Send {
        target: String,
        is_third_party: bool,
    },
}

impl EffectPayload {
    pub fn effect_type(&self) -> &'static str {
        match self {
            Self::FunctionCall { .. } => "FunctionCall",
            Self::Store { .. } => "Store",
            Self::Retrieve { .. } => "Retrieve",
            Self::Send { .. } => "Send",
        }
    }
}

/// A side-effect observation attached to a source entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectRecord {
    pub effect_id: String,
    pub source_entity_id: String,
    pub payload: EffectPayload,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub branch: String,
    pub is_deleted: bool,
    pub updated_at: i64,
}

impl EffectRecord {
    pub fn effect_type(&self) -> &'static str {
        self.payload.effect_type()
    }
}
