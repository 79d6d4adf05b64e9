//! DevAC Parser — tree-sitter extraction of nodes, edges, refs, and effects

pub mod analyzer;
pub mod languages;
pub mod parser_pool;

#[cfg(test)]
mod tests;

use devac_core::{EdgeRecord, EffectRecord, ExternalRefRecord, NodeRecord};
use std::path::PathBuf;

pub use analyzer::{AnalysisReport, PackageAnalyzer};
pub use languages::parser_for;
pub use parser_pool::{ParserPool, create_parser_pool};

/// Configuration shared by all language parsers for one package run.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Logical repository name, first segment of every entity id.
    pub repo_name: String,
    /// Package path relative to the repository root (`.` at the root).
    pub package_path: PathBuf,
    /// Branch the produced records are tagged with.
    pub branch: String,
    /// Whether `*.test.*` / `*_test.*` / `test_*` files are analyzed.
    pub recognize_test_files: bool,
    /// Files larger than this are skipped with a warning.
    pub max_file_bytes: u64,
    /// Per-file parse deadline.
    pub file_timeout_ms: u64,
}

impl ParserConfig {
    pub fn new(repo_name: impl Into<String>, package_path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        ParserConfig {
            repo_name: repo_name.into(),
            package_path: package_path.into(),
            branch: branch.into(),
            recognize_test_files: false,
            max_file_bytes: 2 * 1024 * 1024,
            file_timeout_ms: 10_000,
        }
    }
}

/// Everything extracted from a single source file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub external_refs: Vec<ExternalRefRecord>,
    pub effects: Vec<EffectRecord>,
    pub source_file_hash: String,
    pub parse_time_ms: u64,
    /// Non-fatal conditions hit while extracting this file.
    pub warnings: Vec<String>,
}

/// A language-specific parser. Implementations are interchangeable: each
/// produces entity ids from the shared identity scheme, marks cross-file
/// edge targets with the `unresolved:` sentinel, and tags call effects
/// with import-derived externality.
pub trait LanguageParser: Send + Sync {
    /// Parse one file. `file_path` is relative to the package root.
    /// An unparseable file yields an empty result plus a warning; only IO
    /// and infrastructure failures are errors.
    fn parse(&self, file_path: &std::path::Path, content: &[u8], cfg: &ParserConfig) -> devac_core::Result<ParseResult>;
}
