//! Per-package export index built from seed nodes

use devac_core::{DevacError, Language, NodeKind, NodeRecord};
use devac_seed::SeedReader;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One exported symbol of a file.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    /// The name importers use (the exported alias for renamed exports).
    pub exported_name: String,
    pub kind: NodeKind,
    pub is_default: bool,
    pub is_type_only: bool,
    pub entity_id: String,
}

/// Everything the resolver needs to answer lookups for one package and one
/// language, derived from the unified seed view.
#[derive(Debug, Default)]
pub struct ExportIndex {
    /// file → exported entries.
    pub by_file: HashMap<String, Vec<ExportEntry>>,
    /// file → its module node entity id.
    pub module_ids: HashMap<String, String>,
    /// All files of this language present in the package.
    pub files: HashSet<String>,
    /// (file, symbol name) → entity id, exported or not. Whole-file lookup
    /// for call/extends resolution.
    pub by_file_and_name: HashMap<(String, String), String>,
    /// Exported name → entity ids across the package (heuristic lookups).
    pub exported_by_name: HashMap<String, Vec<String>>,
    /// C# namespace → module entity id of a file declaring it.
    pub namespaces: HashMap<String, String>,
    /// Time spent building, for SLO reporting.
    pub build_time_ms: u64,
}

impl ExportIndex {
    /// Exported entry of `file` matching a named import.
    pub fn named_export(&self, file: &str, name: &str) -> Option<&ExportEntry> {
        self.by_file
            .get(file)?
            .iter()
            .find(|e| !e.is_default && e.exported_name == name)
    }

    /// The default export of `file`, if any.
    pub fn default_export(&self, file: &str) -> Option<&ExportEntry> {
        self.by_file.get(file)?.iter().find(|e| e.is_default)
    }

    pub fn module_id(&self, file: &str) -> Option<&String> {
        self.module_ids.get(file)
    }
}

/// Extract the C# namespace from a qualified name shaped
/// `<file>::<Namespace.Type>`.
fn namespace_of(node: &NodeRecord) -> Option<String> {
    let (_, full) = node.qualified_name.split_once("::")?;
    let (namespace, _) = full.rsplit_once('.')?;
    (!namespace.is_empty()).then(|| namespace.to_string())
}

/// Build the index for one language over a package's unified seed view.
pub fn build_index(
    package: &Path,
    branch: &str,
    language: Language,
) -> Result<ExportIndex, DevacError> {
    let started = std::time::Instant::now();
    let reader = SeedReader::new(package, branch);
    let nodes = reader.read_nodes()?;

    let mut index = ExportIndex::default();
    let mut namespace_files: HashMap<String, String> = HashMap::new();
    for node in &nodes {
        let file_language = Language::from_path(Path::new(&node.file_path));
        let matches = match language {
            Language::TypeScript | Language::JavaScript => matches!(
                file_language,
                Some(Language::TypeScript) | Some(Language::JavaScript)
            ),
            other => file_language == Some(other),
        };
        if !matches {
            continue;
        }
        index.files.insert(node.file_path.clone());

        if node.kind == NodeKind::Module {
            index
                .module_ids
                .insert(node.file_path.clone(), node.entity_id.clone());
            continue;
        }

        index
            .by_file_and_name
            .entry((node.file_path.clone(), node.name.clone()))
            .or_insert_with(|| node.entity_id.clone());

        if language == Language::CSharp {
            if let Some(namespace) = namespace_of(node) {
                namespace_files
                    .entry(namespace)
                    .or_insert_with(|| node.file_path.clone());
            }
        }

        if node.is_exported {
            let is_type_only = matches!(node.kind, NodeKind::Interface | NodeKind::TypeAlias);
            index
                .by_file
                .entry(node.file_path.clone())
                .or_default()
                .push(ExportEntry {
                    exported_name: node.name.clone(),
                    kind: node.kind,
                    is_default: node.is_default_export,
                    is_type_only,
                    entity_id: node.entity_id.clone(),
                });
            index
                .exported_by_name
                .entry(node.name.clone())
                .or_default()
                .push(node.entity_id.clone());
        }
    }

    // Namespace targets point at the declaring file's module node.
    for (namespace, file) in namespace_files {
        if let Some(module_id) = index.module_ids.get(&file) {
            index.namespaces.insert(namespace, module_id.clone());
        }
    }

    index.build_time_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        "Built {:?} export index for {}: {} files, {} exported names in {}ms",
        language,
        package.display(),
        index.files.len(),
        index.exported_by_name.len(),
        index.build_time_ms
    );
    Ok(index)
}
