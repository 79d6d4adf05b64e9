//! Affected-impact analysis over the cross-repo edge graph

use crate::hub::FederationHub;
use devac_core::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Instant;

/// Whether a repo depends on the change directly or through intermediaries.
/// A repo reached both ways reports `Direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Direct,
    Transitive,
}

/// Analysis bounds and filters.
#[derive(Debug, Clone)]
pub struct AffectedOptions {
    /// BFS depth bound. 0 analyzes nothing beyond the changed set.
    pub max_depth: usize,
    /// Visited-set cap; exceeding it truncates the walk.
    pub max_visited: usize,
    /// Keep only these repos in the result (after the walk).
    pub include_repos: Vec<String>,
    /// Drop these repos from the result (after the walk).
    pub exclude_repos: Vec<String>,
}

impl Default for AffectedOptions {
    fn default() -> Self {
        AffectedOptions {
            max_depth: 10,
            max_visited: 50_000,
            include_repos: Vec::new(),
            exclude_repos: Vec::new(),
        }
    }
}

/// Impact on one repo.
#[derive(Debug, Clone, Serialize)]
pub struct RepoImpact {
    pub repo_id: String,
    pub affected_entities: Vec<String>,
    pub impact_level: ImpactLevel,
}

/// Result of one affected analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AffectedResult {
    pub changed_entities: Vec<String>,
    pub affected_repos: Vec<RepoImpact>,
    /// Count of unique affected entities across repos.
    pub total_affected: usize,
    pub truncated: bool,
    pub analysis_time_ms: u64,
}

/// Walks the hub's reverse dependency graph with a bounded, cycle-safe
/// breadth-first search. The frontier is queried in bulk per level; an
/// explicit visited set makes cyclic graphs terminate.
pub struct AffectedAnalyzer<'hub> {
    hub: &'hub FederationHub,
}

impl<'hub> AffectedAnalyzer<'hub> {
    pub fn new(hub: &'hub FederationHub) -> Self {
        AffectedAnalyzer { hub }
    }

    /// Compute the transitive upstream impact of a set of changed
    /// entities.
    pub fn analyze(&self, changed: &[String], options: &AffectedOptions) -> Result<AffectedResult> {
        let started = Instant::now();

        let mut visited: HashSet<String> = changed.iter().cloned().collect();
        // repo → (entities, shallowest depth seen)
        let mut repos: BTreeMap<String, (HashSet<String>, usize)> = BTreeMap::new();
        let mut frontier: Vec<String> = changed.to_vec();
        let mut truncated = false;

        let mut depth = 0;
        while !frontier.is_empty() && depth < options.max_depth {
            depth += 1;
            let dependents = self.hub.get_cross_repo_dependents(&frontier)?;
            let mut next: Vec<String> = Vec::new();
            for edge in dependents {
                if !visited.insert(edge.source_entity_id.clone()) {
                    continue;
                }
                let entry = repos
                    .entry(edge.source_repo.clone())
                    .or_insert_with(|| (HashSet::new(), depth));
                entry.0.insert(edge.source_entity_id.clone());
                // Direct reachability wins over transitive.
                entry.1 = entry.1.min(depth);
                next.push(edge.source_entity_id);
                if visited.len() > options.max_visited {
                    truncated = true;
                    break;
                }
            }
            if truncated {
                break;
            }
            frontier = next;
        }

        let include: HashSet<&String> = options.include_repos.iter().collect();
        let exclude: HashSet<&String> = options.exclude_repos.iter().collect();
        let mut affected_repos: Vec<RepoImpact> = repos
            .into_iter()
            .filter(|(repo_id, _)| include.is_empty() || include.contains(repo_id))
            .filter(|(repo_id, _)| !exclude.contains(repo_id))
            .map(|(repo_id, (entities, min_depth))| {
                let mut affected_entities: Vec<String> = entities.into_iter().collect();
                affected_entities.sort();
                RepoImpact {
                    repo_id,
                    affected_entities,
                    impact_level: if min_depth <= 1 {
                        ImpactLevel::Direct
                    } else {
                        ImpactLevel::Transitive
                    },
                }
            })
            .collect();
        affected_repos.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));

        // Entities are unique per repo and globally (one visited set), so
        // the total is the sum of the per-repo sets.
        let total_affected = affected_repos
            .iter()
            .map(|r| r.affected_entities.len())
            .sum();

        Ok(AffectedResult {
            changed_entities: changed.to_vec(),
            affected_repos,
            total_affected,
            truncated,
            analysis_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// File-level entry: map a changed file to its entity ids via the
    /// repo's seeds, then analyze.
    pub fn analyze_file(
        &self,
        file_path: &str,
        repo_local_path: &Path,
        options: &AffectedOptions,
    ) -> Result<AffectedResult> {
        let changed = entities_in_file(repo_local_path, file_path)?;
        self.analyze(&changed, options)
    }
}

/// Find every seeded package under a repo root (bounded recursion,
/// skipping hidden directories and dependency trees).
fn seeded_packages(repo_root: &Path) -> Vec<std::path::PathBuf> {
    fn walk(dir: &Path, depth: usize, out: &mut Vec<std::path::PathBuf>) {
        if depth > 4 {
            return;
        }
        if devac_seed::layout::seed_dir(dir).exists() {
            out.push(dir.to_path_buf());
        }
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name == "node_modules" || name == "target" {
                continue;
            }
            walk(&path, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(repo_root, 0, &mut out);
    out
}

/// Entity ids defined in a file, looked up across the repo's packages.
/// `file_path` is relative to the repo root.
fn entities_in_file(repo_root: &Path, file_path: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for package in seeded_packages(repo_root) {
        let rel_to_package = match package.strip_prefix(repo_root) {
            Ok(prefix) if !prefix.as_os_str().is_empty() => {
                let prefix = devac_core::normalize_path(prefix);
                match file_path.strip_prefix(&format!("{prefix}/")) {
                    Some(rest) => rest.to_string(),
                    None => continue,
                }
            }
            _ => file_path.to_string(),
        };
        let reader = devac_seed::SeedReader::new(&package, devac_core::BRANCH_BASE);
        let nodes = reader.read_nodes()?;
        out.extend(
            nodes
                .into_iter()
                .filter(|n| n.file_path == rel_to_package)
                .map(|n| n.entity_id),
        );
    }
    Ok(out)
}
