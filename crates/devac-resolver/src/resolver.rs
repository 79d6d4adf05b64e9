//! Generic resolution machinery shared by the language resolvers
//!
//! Each language contributes module-resolution rules; everything else —
//! index caching, ref rebinding, call/extends precedence, persistence —
//! is identical across languages and lives here.

use crate::export_index::{ExportIndex, build_index};
use dashmap::DashMap;
use devac_core::{
    DevacError, EdgeKind, EdgeRecord, ExternalRefRecord, Language, now_millis,
};
use devac_seed::{SeedReader, SeedWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// How a resolution was obtained. Confidence is fixed per method except for
/// heuristics, which stay below 0.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// External type service. Reserved; this implementation resolves from
    /// its own export index.
    Compiler,
    /// Same-file binding.
    Local,
    /// Cross-file binding through an import.
    Imported,
    /// Name-based fallback.
    Heuristic,
}

impl ResolutionMethod {
    pub fn confidence(&self) -> f32 {
        match self {
            ResolutionMethod::Compiler | ResolutionMethod::Local => 1.0,
            ResolutionMethod::Imported => 0.9,
            ResolutionMethod::Heuristic => 0.8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Compiler => "compiler",
            ResolutionMethod::Local => "local",
            ResolutionMethod::Imported => "imported",
            ResolutionMethod::Heuristic => "heuristic",
        }
    }
}

/// A successfully rebound external ref.
#[derive(Debug, Clone)]
pub struct ResolvedRef {
    /// (source entity, module specifier, imported symbol).
    pub ref_key: (String, String, String),
    pub target_entity_id: String,
    pub confidence: f32,
    pub method: ResolutionMethod,
}

/// A successfully rebound edge target.
#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    pub original: EdgeRecord,
    pub target_entity_id: String,
    pub confidence: f32,
    pub method: ResolutionMethod,
}

/// Outcome of resolving one package's refs for one language.
#[derive(Debug, Clone, Default)]
pub struct ResolutionSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub resolved_refs: Vec<ResolvedRef>,
    pub errors: Vec<String>,
    pub time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-package resolution deadline.
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig { timeout_ms: 30_000 }
    }
}

/// Language-specific module resolution, plugged into the shared resolver.
pub trait ModuleRules: Send + Sync {
    fn language(&self) -> Language;

    /// Whether refs/edges from this file belong to this resolver.
    fn matches_file(&self, file: &str) -> bool {
        let file_language = Language::from_path(Path::new(file));
        match self.language() {
            Language::TypeScript | Language::JavaScript => matches!(
                file_language,
                Some(Language::TypeScript) | Some(Language::JavaScript)
            ),
            other => file_language == Some(other),
        }
    }

    /// Map a module specifier to a file present in the index, from the
    /// perspective of `from_file`. `None` for external modules.
    fn resolve_module(&self, from_file: &str, specifier: &str, index: &ExportIndex) -> Option<String>;

    /// Whether non-relative specifiers may still resolve in-package
    /// (C# namespaces). Everything else treats them as external.
    fn allows_bare_specifiers(&self) -> bool {
        false
    }

    /// Last-chance symbol binding once the module file's exports had no
    /// match (Python `from . import submodule`).
    fn resolve_symbol_fallback(
        &self,
        _from_file: &str,
        _specifier: &str,
        _symbol: &str,
        _index: &ExportIndex,
    ) -> Option<String> {
        None
    }
}

/// The public capability surface every language resolver provides.
pub trait LanguageResolver: Send + Sync {
    fn language(&self) -> Language;
    /// Whether this resolver can run at all in the current environment.
    fn available(&self) -> bool;
    fn build_export_index(&self, package: &Path) -> Result<Arc<ExportIndex>, DevacError>;
    fn resolve_ref(&self, reference: &ExternalRefRecord, index: &ExportIndex) -> Option<ResolvedRef>;
    fn resolve_calls(&self, package: &Path, edges: &[EdgeRecord]) -> Result<Vec<ResolvedEdge>, DevacError>;
    fn resolve_extends(&self, package: &Path, edges: &[EdgeRecord]) -> Result<Vec<ResolvedEdge>, DevacError>;
    fn resolve_package(
        &self,
        package: &Path,
        refs: &[ExternalRefRecord],
    ) -> Result<ResolutionSummary, DevacError>;
    fn clear_cache(&self, package: &Path);
    fn clear_all_caches(&self);
}

/// Shared resolver over a set of module rules. The export index cache is
/// owned exclusively here; parsers never see it.
pub struct SemanticResolver<R: ModuleRules> {
    rules: R,
    branch: String,
    config: ResolverConfig,
    cache: DashMap<PathBuf, Arc<ExportIndex>>,
}

impl<R: ModuleRules> SemanticResolver<R> {
    pub(crate) fn with_rules(rules: R, branch: &str) -> Self {
        SemanticResolver {
            rules,
            branch: branch.to_string(),
            config: ResolverConfig::default(),
            cache: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    fn index_for(&self, package: &Path) -> Result<Arc<ExportIndex>, DevacError> {
        if let Some(cached) = self.cache.get(package) {
            return Ok(cached.value().clone());
        }
        let index = Arc::new(build_index(package, &self.branch, self.rules.language())?);
        self.cache.insert(package.to_path_buf(), index.clone());
        Ok(index)
    }

    /// Rebind one edge target with the local → imported → heuristic
    /// precedence.
    fn resolve_edge_target(
        &self,
        edge: &EdgeRecord,
        refs: &[ExternalRefRecord],
        index: &ExportIndex,
    ) -> Option<ResolvedEdge> {
        let symbol = edge.unresolved_symbol()?;
        let file = edge.file_path.as_deref()?;
        if !self.rules.matches_file(file) {
            return None;
        }

        // Same-file definitions always win.
        if let Some(entity) = index.by_file_and_name.get(&(file.to_string(), symbol.to_string())) {
            return Some(ResolvedEdge {
                original: edge.clone(),
                target_entity_id: entity.clone(),
                confidence: ResolutionMethod::Local.confidence(),
                method: ResolutionMethod::Local,
            });
        }

        // Then a binding imported into this file.
        let imported = refs
            .iter()
            .filter(|r| r.file_path == file && r.imported_symbol == symbol)
            .find_map(|r| self.resolve_ref_inner(r, index));
        if let Some(resolved) = imported {
            return Some(ResolvedEdge {
                original: edge.clone(),
                target_entity_id: resolved.target_entity_id,
                confidence: ResolutionMethod::Imported.confidence(),
                method: ResolutionMethod::Imported,
            });
        }

        // Finally a package-unique exported name.
        match index.exported_by_name.get(symbol).map(Vec::as_slice) {
            Some([only]) => Some(ResolvedEdge {
                original: edge.clone(),
                target_entity_id: only.clone(),
                confidence: ResolutionMethod::Heuristic.confidence(),
                method: ResolutionMethod::Heuristic,
            }),
            _ => None,
        }
    }

    fn resolve_ref_inner(
        &self,
        reference: &ExternalRefRecord,
        index: &ExportIndex,
    ) -> Option<ResolvedRef> {
        if !self.rules.matches_file(&reference.file_path) {
            return None;
        }
        if !reference.is_relative() && !self.rules.allows_bare_specifiers() {
            return None; // external module, by contract not an error
        }

        let module_file =
            self.rules
                .resolve_module(&reference.file_path, &reference.module_specifier, index);

        if let Some(module_file) = module_file {
            let entry = if reference.is_namespace || reference.imported_symbol == "*" {
                index.module_id(&module_file).cloned()
            } else if reference.is_default {
                index.default_export(&module_file).map(|e| e.entity_id.clone())
            } else {
                index
                    .named_export(&module_file, &reference.imported_symbol)
                    .map(|e| e.entity_id.clone())
            };
            if let Some(target) = entry {
                return Some(ResolvedRef {
                    ref_key: reference.key(),
                    target_entity_id: target,
                    confidence: ResolutionMethod::Imported.confidence(),
                    method: ResolutionMethod::Imported,
                });
            }
        }

        self.rules
            .resolve_symbol_fallback(
                &reference.file_path,
                &reference.module_specifier,
                &reference.imported_symbol,
                index,
            )
            .map(|target| ResolvedRef {
                ref_key: reference.key(),
                target_entity_id: target,
                confidence: ResolutionMethod::Heuristic.confidence(),
                method: ResolutionMethod::Heuristic,
            })
    }

    fn resolve_edges_of_kind(
        &self,
        package: &Path,
        edges: &[EdgeRecord],
        kinds: &[EdgeKind],
    ) -> Result<Vec<ResolvedEdge>, DevacError> {
        let index = self.index_for(package)?;
        let refs = SeedReader::new(package, &self.branch).read_external_refs()?;
        Ok(edges
            .iter()
            .filter(|e| kinds.contains(&e.edge_type) && e.is_unresolved() && !e.is_deleted)
            .filter_map(|e| self.resolve_edge_target(e, &refs, &index))
            .collect())
    }
}

impl<R: ModuleRules> LanguageResolver for SemanticResolver<R> {
    fn language(&self) -> Language {
        self.rules.language()
    }

    fn available(&self) -> bool {
        true
    }

    fn build_export_index(&self, package: &Path) -> Result<Arc<ExportIndex>, DevacError> {
        self.index_for(package)
    }

    fn resolve_ref(&self, reference: &ExternalRefRecord, index: &ExportIndex) -> Option<ResolvedRef> {
        self.resolve_ref_inner(reference, index)
    }

    fn resolve_calls(&self, package: &Path, edges: &[EdgeRecord]) -> Result<Vec<ResolvedEdge>, DevacError> {
        self.resolve_edges_of_kind(package, edges, &[EdgeKind::Calls])
    }

    fn resolve_extends(&self, package: &Path, edges: &[EdgeRecord]) -> Result<Vec<ResolvedEdge>, DevacError> {
        self.resolve_edges_of_kind(package, edges, &[EdgeKind::Extends, EdgeKind::Implements])
    }

    fn resolve_package(
        &self,
        package: &Path,
        refs: &[ExternalRefRecord],
    ) -> Result<ResolutionSummary, DevacError> {
        let started = Instant::now();
        let index = self.index_for(package)?;
        let mut summary = ResolutionSummary::default();

        for reference in refs.iter().filter(|r| self.rules.matches_file(&r.file_path)) {
            summary.total += 1;
            if reference.is_resolved {
                // Idempotence: already-resolved refs are left untouched.
                summary.resolved += 1;
                continue;
            }
            if started.elapsed().as_millis() as u64 > self.config.timeout_ms {
                summary.errors.push(format!(
                    "resolution timed out after {}ms; remaining refs left unresolved",
                    self.config.timeout_ms
                ));
                summary.unresolved += 1;
                continue;
            }
            match self.resolve_ref_inner(reference, &index) {
                Some(resolved) => {
                    summary.resolved += 1;
                    summary.resolved_refs.push(resolved);
                }
                None => summary.unresolved += 1,
            }
        }

        summary.time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    fn clear_cache(&self, package: &Path) {
        self.cache.remove(package);
    }

    fn clear_all_caches(&self) {
        self.cache.clear();
    }
}

/// Aggregate outcome of a full resolve-and-persist run over one package.
#[derive(Debug, Clone, Default)]
pub struct PackageResolution {
    pub refs_total: usize,
    pub refs_resolved: usize,
    pub refs_unresolved: usize,
    pub edges_resolved: usize,
    pub errors: Vec<String>,
    pub time_ms: u64,
}

/// Resolve a package's refs and unresolved edges with every applicable
/// resolver and write the rebindings back into the seed. Unresolved
/// entries are preserved for future runs.
pub fn resolve_and_persist(
    package: &Path,
    branch: &str,
    resolvers: &[Box<dyn LanguageResolver>],
) -> Result<PackageResolution, DevacError> {
    let started = Instant::now();
    let reader = SeedReader::new(package, branch);
    let refs = reader.read_external_refs()?;
    let edges = reader.read_edges()?;
    let writer = SeedWriter::new(package, branch);

    let mut outcome = PackageResolution::default();
    let mut updated_refs: Vec<ExternalRefRecord> = Vec::new();
    let mut updated_edges: Vec<EdgeRecord> = Vec::new();

    for resolver in resolvers {
        if !resolver.available() {
            continue;
        }
        let summary = resolver.resolve_package(package, &refs)?;
        outcome.refs_total += summary.total;
        outcome.refs_resolved += summary.resolved;
        outcome.refs_unresolved += summary.unresolved;
        outcome.errors.extend(summary.errors.iter().cloned());

        for resolved in &summary.resolved_refs {
            if let Some(original) = refs.iter().find(|r| r.key() == resolved.ref_key) {
                let mut updated = original.clone();
                updated.is_resolved = true;
                updated.target_entity_id = Some(resolved.target_entity_id.clone());
                updated.updated_at = now_millis();
                updated_refs.push(updated);
            }
        }

        let unresolved_edges: Vec<EdgeRecord> = edges
            .iter()
            .filter(|e| e.is_unresolved() && !e.is_deleted)
            .cloned()
            .collect();
        let mut rebound = resolver.resolve_calls(package, &unresolved_edges)?;
        rebound.extend(resolver.resolve_extends(package, &unresolved_edges)?);
        for edge in rebound {
            // The target is part of the edge's primary key: insert the
            // rebound edge and tombstone the unresolved original.
            let mut tombstone = edge.original.clone();
            tombstone.is_deleted = true;
            tombstone.updated_at = now_millis();
            let mut replacement = edge.original.clone();
            replacement.target_entity_id = edge.target_entity_id.clone();
            replacement.updated_at = now_millis();
            updated_edges.push(tombstone);
            updated_edges.push(replacement);
            outcome.edges_resolved += 1;
        }
    }

    writer.upsert_external_refs(updated_refs)?;
    writer.upsert_edges(updated_edges)?;
    outcome.time_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "Resolved {}/{} refs and {} edges for {} in {}ms",
        outcome.refs_resolved,
        outcome.refs_total,
        outcome.edges_resolved,
        package.display(),
        outcome.time_ms
    );
    Ok(outcome)
}
