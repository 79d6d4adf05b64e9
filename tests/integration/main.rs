//! Integration tests for the DevAC pipeline
//!
//! These exercise the full flow: parse → seed → resolve → query → hub →
//! affected analysis, across crate boundaries.

use devac_core::{BRANCH_BASE, EdgeKind, parse_hook_output, parse_status_line};
use devac_hub::{AffectedAnalyzer, AffectedOptions, CrossRepoEdge, FederationHub, ImpactLevel};
use devac_parser::{PackageAnalyzer, ParserConfig};
use devac_query::QueryEngine;
use devac_resolver::{all_resolvers, resolve_and_persist};
use devac_seed::SeedReader;
use std::fs;
use tempfile::TempDir;

fn write_ts_package(dir: &TempDir) {
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/helper.ts"),
        "export function helper(): number {\n    return 41;\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/consumer.ts"),
        "import { helper } from './helper';\n\nexport function consume(): number {\n    return helper() + 1;\n}\n",
    )
    .unwrap();
}

/// Full pipeline: analyze a package, resolve its refs, query the views.
#[test]
fn test_analyze_resolve_query_pipeline() {
    let dir = TempDir::new().unwrap();
    write_ts_package(&dir);

    // Analyze.
    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("demo", ".", BRANCH_BASE);
    let report = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();
    assert_eq!(report.files_analyzed, 2);
    assert_eq!(report.files_failed, 0);

    // Resolve: the consumer's import and call bind to the helper.
    let resolvers = all_resolvers(BRANCH_BASE);
    let outcome = resolve_and_persist(dir.path(), BRANCH_BASE, &resolvers).unwrap();
    assert_eq!(outcome.refs_resolved, 1);

    let reader = SeedReader::new(dir.path(), BRANCH_BASE);
    let refs = reader.read_external_refs().unwrap();
    assert!(refs.iter().all(|r| r.is_resolved));

    let helper_id = reader
        .read_nodes()
        .unwrap()
        .into_iter()
        .find(|n| n.name == "helper")
        .unwrap()
        .entity_id;
    let edges = reader.read_edges().unwrap();
    let call = edges
        .iter()
        .find(|e| e.edge_type == EdgeKind::Calls)
        .unwrap();
    assert_eq!(call.target_entity_id, helper_id);

    // Query through the engine's views.
    let engine = QueryEngine::with_defaults().unwrap();
    engine
        .setup_views(&[dir.path().to_path_buf()], BRANCH_BASE)
        .unwrap();
    let count = engine
        .execute_count("SELECT COUNT(*) FROM {nodes} WHERE kind = 'function'")
        .unwrap();
    assert_eq!(count, 2);
    let unresolved = engine
        .execute_count(&format!(
            "SELECT COUNT(*) FROM {} WHERE target_entity_id LIKE 'unresolved:%' AND edge_type = 'CALLS'",
            "{edges}"
        ))
        .unwrap();
    assert_eq!(unresolved, 0);
}

/// Branch partitions overlay base: a branch row hides the base row, and
/// re-analysis on a branch leaves base untouched.
#[test]
fn test_branch_overlay_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_ts_package(&dir);

    let analyzer = PackageAnalyzer::new();
    let base_cfg = ParserConfig::new("demo", ".", BRANCH_BASE);
    analyzer.analyze_package(dir.path(), &base_cfg, false).unwrap();

    // Edit on a feature branch.
    fs::write(
        dir.path().join("src/helper.ts"),
        "export function helper(): number {\n    return 42;\n}\n\nexport function extra(): number {\n    return 0;\n}\n",
    )
    .unwrap();
    let branch_cfg = ParserConfig::new("demo", ".", "feature");
    analyzer.analyze_package(dir.path(), &branch_cfg, false).unwrap();

    let branch_nodes = SeedReader::new(dir.path(), "feature").read_nodes().unwrap();
    assert!(branch_nodes.iter().any(|n| n.name == "extra"));
    // One visible row per entity id even though base also has helper.
    let helper_rows: Vec<_> = branch_nodes.iter().filter(|n| n.name == "helper").collect();
    assert_eq!(helper_rows.len(), 1);
    assert_eq!(helper_rows[0].branch, "feature");

    let base_nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert!(!base_nodes.iter().any(|n| n.name == "extra"));
}

/// Hub federation: direct and transitive impact across three repos.
#[test]
fn test_affected_across_hub() {
    let workspace = TempDir::new().unwrap();
    let hub = FederationHub::open(workspace.path(), false).unwrap();

    hub.add_cross_repo_edges(&[
        CrossRepoEdge {
            source_repo: "b".to_string(),
            source_entity_id: "b:.:src/b.ts:function:bbbbbbbb".to_string(),
            target_repo: "a".to_string(),
            target_entity_id: "a:.:src/a.ts:function:aaaaaaaa".to_string(),
            edge_type: "CALLS".to_string(),
            metadata: None,
        },
        CrossRepoEdge {
            source_repo: "c".to_string(),
            source_entity_id: "c:.:src/c.ts:function:cccccccc".to_string(),
            target_repo: "b".to_string(),
            target_entity_id: "b:.:src/b.ts:function:bbbbbbbb".to_string(),
            edge_type: "CALLS".to_string(),
            metadata: None,
        },
    ])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(
            &["a:.:src/a.ts:function:aaaaaaaa".to_string()],
            &AffectedOptions::default(),
        )
        .unwrap();

    assert_eq!(result.total_affected, 2);
    let b = result.affected_repos.iter().find(|r| r.repo_id == "b").unwrap();
    assert_eq!(b.impact_level, ImpactLevel::Direct);
    let c = result.affected_repos.iter().find(|r| r.repo_id == "c").unwrap();
    assert_eq!(c.impact_level, ImpactLevel::Transitive);

    // Re-running over the same hub state is deterministic.
    let again = analyzer
        .analyze(
            &["a:.:src/a.ts:function:aaaaaaaa".to_string()],
            &AffectedOptions::default(),
        )
        .unwrap();
    assert_eq!(again.total_affected, result.total_affected);
}

/// File-level affected entry: seeds map a file to its entities.
#[test]
fn test_affected_from_file() {
    let repo = TempDir::new().unwrap();
    write_ts_package(&repo);
    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("demo", ".", BRANCH_BASE);
    analyzer.analyze_package(repo.path(), &cfg, false).unwrap();

    let helper_id = SeedReader::new(repo.path(), BRANCH_BASE)
        .read_nodes()
        .unwrap()
        .into_iter()
        .find(|n| n.name == "helper")
        .unwrap()
        .entity_id;

    let workspace = TempDir::new().unwrap();
    let hub = FederationHub::open(workspace.path(), false).unwrap();
    hub.add_cross_repo_edges(&[CrossRepoEdge {
        source_repo: "other".to_string(),
        source_entity_id: "other:.:src/x.ts:function:xxxxxxxx".to_string(),
        target_repo: "demo".to_string(),
        target_entity_id: helper_id,
        edge_type: "CALLS".to_string(),
        metadata: None,
    }])
    .unwrap();

    let affected = AffectedAnalyzer::new(&hub)
        .analyze_file("src/helper.ts", repo.path(), &AffectedOptions::default())
        .unwrap();
    assert_eq!(affected.total_affected, 1);
    assert_eq!(affected.affected_repos[0].repo_id, "other");
}

/// Hook output and status-line contracts used by assistant adapters.
#[test]
fn test_hook_contracts() {
    let parsed = parse_hook_output(
        r#"{"stopReason":"Validation found issues:\n- 2 TypeScript errors in src/error.ts\n\nConsider fixing these before continuing."}"#,
    );
    assert!(parsed.valid);
    assert_eq!(parsed.counts.errors, 2);
    assert_eq!(parsed.counts.warnings, 0);

    let parsed = parse_hook_output(r#"{"wrongField":"x"}"#);
    assert!(!parsed.valid);
    assert_eq!(parsed.error.as_deref(), Some("Schema validation failed"));

    let counts = parse_status_line("DevAC Status: 5 errors, 3 warnings");
    assert_eq!((counts.errors, counts.warnings), (5, 3));
    let counts = parse_status_line("No issues found");
    assert_eq!((counts.errors, counts.warnings), (0, 0));
}

/// The query cache honors TTL semantics, including ttl=0 = never cache.
#[test]
fn test_hub_query_cache_contract() {
    let workspace = TempDir::new().unwrap();
    let hub = FederationHub::open(workspace.path(), false).unwrap();

    hub.cache_query("q1", "[1,2,3]", 300).unwrap();
    assert_eq!(hub.get_cached_query("q1").unwrap().as_deref(), Some("[1,2,3]"));

    hub.cache_query("q0", "[]", 0).unwrap();
    assert!(hub.get_cached_query("q0").unwrap().is_none());
}
