//! CLI command implementations
//!
//! Each command prints one JSON document to stdout with a `success` flag;
//! process exit code is 0 on success and 1 on failure (anyhow from main).

use devac_hub::{AffectedAnalyzer, AffectedOptions, FederationHub, RepoRegistration};
use devac_parser::{PackageAnalyzer, ParserConfig};
use devac_query::QueryEngine;
use devac_resolver::all_resolvers;
use devac_rules::{GroupingInput, engines_for_package};
use devac_seed::SeedReader;
use serde_json::json;
use std::path::PathBuf;

fn emit(doc: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub async fn analyze(
    package: PathBuf,
    repo: String,
    branch: String,
    force: bool,
    include_tests: bool,
) -> anyhow::Result<()> {
    tracing::info!("Analyzing {} (branch {branch})", package.display());

    let mut cfg = ParserConfig::new(repo, ".", branch);
    cfg.recognize_test_files = include_tests;

    let analyzer = PackageAnalyzer::new();
    let report = analyzer.analyze_package(&package, &cfg, force)?;

    emit(json!({
        "success": true,
        "filesAnalyzed": report.files_analyzed,
        "filesSkipped": report.files_skipped,
        "filesFailed": report.files_failed,
        "nodes": report.nodes,
        "edges": report.edges,
        "externalRefs": report.external_refs,
        "effects": report.effects,
        "errors": report.errors.iter().map(|e| json!({"file": e.file, "message": e.message})).collect::<Vec<_>>(),
        "warnings": report.warnings,
        "durationMs": report.duration_ms,
    }))
}

pub async fn resolve(package: PathBuf, branch: String) -> anyhow::Result<()> {
    tracing::info!("Resolving {} (branch {branch})", package.display());

    let resolvers = all_resolvers(&branch);
    let outcome = devac_resolver::resolve_and_persist(&package, &branch, &resolvers)?;

    emit(json!({
        "success": true,
        "refsTotal": outcome.refs_total,
        "refsResolved": outcome.refs_resolved,
        "refsUnresolved": outcome.refs_unresolved,
        "edgesResolved": outcome.edges_resolved,
        "errors": outcome.errors,
        "timeMs": outcome.time_ms,
    }))
}

pub async fn query(sql: String, packages: Vec<PathBuf>, branch: String) -> anyhow::Result<()> {
    let engine = QueryEngine::with_defaults()?;
    engine.setup_views(&packages, &branch)?;
    let rows = engine.execute(&sql)?;

    emit(json!({
        "success": true,
        "rowCount": rows.len(),
        "rows": rows,
    }))
}

pub async fn effects(package: PathBuf, branch: String) -> anyhow::Result<()> {
    let reader = SeedReader::new(&package, branch);
    let effects = reader.read_effects()?;
    let nodes = reader.read_nodes()?;

    let (mut domain_engine, mut grouping_engine, _) = engines_for_package(&package)?;
    let report = domain_engine.process(&effects);

    let containers: Vec<serde_json::Value> = report
        .domain_effects
        .iter()
        .map(|de| {
            let node = nodes.iter().find(|n| n.entity_id == de.source_entity_id);
            let input = GroupingInput {
                file_path: node.map(|n| n.file_path.clone()).unwrap_or_default(),
                entity_name: node.map(|n| n.name.clone()).unwrap_or_default(),
                entity_kind: node.map(|n| n.kind),
                domain: Some(de.domain.clone()),
                action: Some(de.action.clone()),
            };
            let emit = grouping_engine.apply(&input);
            json!({
                "effectId": de.effect_id,
                "domain": de.domain,
                "action": de.action,
                "container": emit.container,
                "layer": emit.layer,
            })
        })
        .collect();

    emit(json!({
        "success": true,
        "total": effects.len(),
        "matched": report.matched,
        "unmatched": report.unmatched,
        "ruleStats": report.rule_stats,
        "processTimeMs": report.process_time_ms,
        "effects": containers,
    }))
}

pub fn status(packages: Vec<PathBuf>, branch: String) -> anyhow::Result<()> {
    let readiness = QueryEngine::readiness(&packages, &branch);
    emit(json!({
        "success": true,
        "ready": readiness.ready,
        "reason": readiness.reason,
        "suggestion": readiness.suggestion,
        "availableCount": readiness.available_count,
        "missingCount": readiness.missing_count,
    }))
}

pub fn hub_register(workspace: PathBuf, repo_id: String, path: PathBuf) -> anyhow::Result<()> {
    let hub = FederationHub::open(&workspace, false)?;
    let registration = RepoRegistration::new(repo_id.clone(), path.to_string_lossy());
    hub.add_repo(&registration)?;
    emit(json!({ "success": true, "repoId": repo_id }))
}

pub fn hub_unregister(workspace: PathBuf, repo_id: String) -> anyhow::Result<()> {
    let hub = FederationHub::open(&workspace, false)?;
    hub.remove_repo(&repo_id)?;
    emit(json!({ "success": true, "repoId": repo_id }))
}

pub fn hub_list(workspace: PathBuf) -> anyhow::Result<()> {
    let hub = FederationHub::open(&workspace, false)?;
    let repos = hub.list_repos()?;
    emit(json!({ "success": true, "repos": repos }))
}

pub fn hub_sync(workspace: PathBuf, repo_id: String, manifest_hash: String) -> anyhow::Result<()> {
    let hub = FederationHub::open(&workspace, false)?;
    hub.update_repo_sync(&repo_id, &manifest_hash)?;
    emit(json!({ "success": true, "repoId": repo_id }))
}

pub fn affected(
    workspace: PathBuf,
    entities: Vec<String>,
    file: Option<String>,
    repo_path: Option<PathBuf>,
    max_depth: usize,
) -> anyhow::Result<()> {
    let hub = FederationHub::open(&workspace, false)?;
    let analyzer = AffectedAnalyzer::new(&hub);
    let options = AffectedOptions {
        max_depth,
        ..AffectedOptions::default()
    };

    let result = match (file, repo_path) {
        (Some(file), Some(repo_path)) => analyzer.analyze_file(&file, &repo_path, &options)?,
        (Some(_), None) => {
            anyhow::bail!("--file requires --repo-path");
        }
        _ => analyzer.analyze(&entities, &options)?,
    };

    emit(json!({
        "success": true,
        "changedEntities": result.changed_entities,
        "affectedRepos": result.affected_repos,
        "totalAffected": result.total_affected,
        "truncated": result.truncated,
        "analysisTimeMs": result.analysis_time_ms,
    }))
}

pub fn clean(package: PathBuf) -> anyhow::Result<()> {
    let seed = devac_seed::seed_dir(&package);
    if seed.exists() {
        std::fs::remove_dir_all(&seed)?;
        tracing::info!("Removed {}", seed.display());
    }
    emit(json!({ "success": true }))
}
