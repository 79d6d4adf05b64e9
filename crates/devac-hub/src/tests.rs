//! Hub + affected analyzer tests

use crate::affected::{AffectedAnalyzer, AffectedOptions, ImpactLevel};
use crate::hub::FederationHub;
use crate::model::*;
use devac_core::DevacError;
use tempfile::TempDir;

fn hub(dir: &TempDir) -> FederationHub {
    FederationHub::open(dir.path(), false).unwrap()
}

fn edge(source_repo: &str, source: &str, target_repo: &str, target: &str) -> CrossRepoEdge {
    CrossRepoEdge {
        source_repo: source_repo.to_string(),
        source_entity_id: source.to_string(),
        target_repo: target_repo.to_string(),
        target_entity_id: target.to_string(),
        edge_type: "CALLS".to_string(),
        metadata: None,
    }
}

fn diagnostic(id: &str, repo: &str, severity: DiagnosticSeverity) -> UnifiedDiagnostic {
    UnifiedDiagnostic {
        diagnostic_id: id.to_string(),
        repo_id: repo.to_string(),
        source: DiagnosticSource::Tsc,
        file: Some("src/a.ts".to_string()),
        line: Some(3),
        column: Some(1),
        severity,
        category: "types".to_string(),
        title: format!("issue {id}"),
        description: None,
        code: Some("TS2322".to_string()),
        suggestion: None,
        resolved: false,
        actionable: true,
        reference: None,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn test_repo_lifecycle() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);

    let mut reg = RepoRegistration::new("api", dir.path().to_string_lossy());
    hub.add_repo(&reg).unwrap();
    assert_eq!(hub.list_repos().unwrap().len(), 1);

    // Upsert: same id replaces.
    reg.manifest_hash = Some("abc".to_string());
    hub.add_repo(&reg).unwrap();
    let repos = hub.list_repos().unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].manifest_hash.as_deref(), Some("abc"));

    hub.update_repo_sync("api", "def").unwrap();
    let repo = hub.get_repo("api").unwrap().unwrap();
    assert_eq!(repo.manifest_hash.as_deref(), Some("def"));
    assert!(repo.last_synced.is_some());

    hub.remove_repo("api").unwrap();
    assert!(hub.list_repos().unwrap().is_empty());
}

#[test]
fn test_missing_repo_path_reported() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_repo(&RepoRegistration::new("ghost", "/nonexistent/path/xyz"))
        .unwrap();
    let repos = hub.list_repos().unwrap();
    assert_eq!(repos[0].status, RepoStatus::Missing);
}

#[test]
fn test_remove_repo_cascades_edges() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_repo(&RepoRegistration::new("a", ".")).unwrap();
    hub.add_repo(&RepoRegistration::new("b", ".")).unwrap();
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:x.ts:function:1", "a", "a:.:y.ts:function:2"),
        edge("a", "a:.:z.ts:function:3", "b", "b:.:w.ts:function:4"),
    ])
    .unwrap();

    hub.remove_repo("a").unwrap();
    // Every edge touching repo `a` is gone, in either direction.
    let remaining = hub
        .get_cross_repo_dependents(&["a:.:y.ts:function:2".to_string(), "b:.:w.ts:function:4".to_string()])
        .unwrap();
    assert!(remaining.is_empty());
}

#[test]
fn test_cross_repo_edges_idempotent() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    let edges = vec![edge("b", "b:.:x.ts:function:1", "a", "a:.:y.ts:function:2")];
    hub.add_cross_repo_edges(&edges).unwrap();
    hub.add_cross_repo_edges(&edges).unwrap();

    let dependents = hub
        .get_cross_repo_dependents(&["a:.:y.ts:function:2".to_string()])
        .unwrap();
    assert_eq!(dependents.len(), 1);
}

#[test]
fn test_edges_targeting_repo_with_file_pattern() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:x.ts:function:1", "a", "a:.:src/api/users.ts:function:2"),
        edge("b", "b:.:x.ts:function:1", "a", "a:.:src/db/pool.ts:function:3"),
    ])
    .unwrap();

    let all = hub.get_edges_targeting_repo("a", None).unwrap();
    assert_eq!(all.len(), 2);

    let api_only = hub.get_edges_targeting_repo("a", Some("src/api/**")).unwrap();
    assert_eq!(api_only.len(), 1);
    assert!(api_only[0].target_entity_id.contains("users.ts"));
}

#[test]
fn test_query_cache_ttl() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);

    hub.cache_query("h1", "{\"rows\":1}", 300).unwrap();
    assert_eq!(hub.get_cached_query("h1").unwrap().as_deref(), Some("{\"rows\":1}"));

    // ttl=0 means never cache.
    hub.cache_query("h2", "{}", 0).unwrap();
    assert!(hub.get_cached_query("h2").unwrap().is_none());

    // An entry whose ttl has elapsed is dropped lazily on read.
    hub.cache_query("h3", "{}", 1).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2100));
    assert!(hub.get_cached_query("h3").unwrap().is_none());
}

#[test]
fn test_diagnostics_upsert_query_resolve() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.upsert_diagnostics(&[
        diagnostic("d1", "api", DiagnosticSeverity::Warning),
        diagnostic("d2", "api", DiagnosticSeverity::Critical),
        diagnostic("d3", "web", DiagnosticSeverity::Error),
    ])
    .unwrap();

    // Ordered by severity: critical, error, warning.
    let all = hub.query_diagnostics(&DiagnosticFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].severity, DiagnosticSeverity::Critical);
    assert_eq!(all[1].severity, DiagnosticSeverity::Error);
    assert_eq!(all[2].severity, DiagnosticSeverity::Warning);

    let api_only = hub
        .query_diagnostics(&DiagnosticFilter {
            repo_id: Some("api".to_string()),
            ..DiagnosticFilter::default()
        })
        .unwrap();
    assert_eq!(api_only.len(), 2);

    // Resolution flips the flag but keeps the record.
    hub.resolve_diagnostics(&["d2".to_string()]).unwrap();
    let unresolved = hub
        .query_diagnostics(&DiagnosticFilter {
            resolved: Some(false),
            ..DiagnosticFilter::default()
        })
        .unwrap();
    assert_eq!(unresolved.len(), 2);
    let counts = hub.diagnostics_counts().unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.unresolved, 2);

    let by_repo = hub.diagnostics_summary(SummaryGroupBy::Repo).unwrap();
    assert_eq!(by_repo.len(), 2);
    assert_eq!(by_repo[0].key, "api");
    assert_eq!(by_repo[0].total, 2);

    let cleared = hub.clear_diagnostics(Some("api"), None).unwrap();
    assert_eq!(cleared, 2);
}

#[test]
fn test_close_semantics() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.close();
    hub.close(); // idempotent
    let err = hub.list_repos().unwrap_err();
    assert!(matches!(err, DevacError::NotInitialized));
}

#[test]
fn test_read_only_hub_rejects_writes() {
    let dir = TempDir::new().unwrap();
    {
        let writable = hub(&dir);
        writable.add_repo(&RepoRegistration::new("api", ".")).unwrap();
        writable.close();
    }
    let readonly = FederationHub::open(dir.path(), true).unwrap();
    assert_eq!(readonly.list_repos().unwrap().len(), 1);
    let err = readonly.add_repo(&RepoRegistration::new("web", ".")).unwrap_err();
    assert!(matches!(err, DevacError::Input(_)));
}

#[test]
fn test_affected_direct_dependent() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    // consumer.c1 calls helper.h1 within repo r.
    hub.add_cross_repo_edges(&[edge(
        "r",
        "r:.:src/consumer.ts:function:c1",
        "r",
        "r:.:src/helper.ts:function:h1",
    )])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(
            &["r:.:src/helper.ts:function:h1".to_string()],
            &AffectedOptions::default(),
        )
        .unwrap();

    assert_eq!(result.affected_repos.len(), 1);
    let impact = &result.affected_repos[0];
    assert_eq!(impact.repo_id, "r");
    assert_eq!(impact.affected_entities, vec!["r:.:src/consumer.ts:function:c1".to_string()]);
    assert_eq!(impact.impact_level, ImpactLevel::Direct);
    assert_eq!(result.total_affected, 1);
}

#[test]
fn test_affected_transitive_cross_repo() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:b.ts:function:b", "a", "a:.:a.ts:function:a"),
        edge("c", "c:.:c.ts:function:c", "b", "b:.:b.ts:function:b"),
    ])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(&["a:.:a.ts:function:a".to_string()], &AffectedOptions::default())
        .unwrap();

    assert_eq!(result.total_affected, 2);
    let b = result.affected_repos.iter().find(|r| r.repo_id == "b").unwrap();
    assert_eq!(b.impact_level, ImpactLevel::Direct);
    let c = result.affected_repos.iter().find(|r| r.repo_id == "c").unwrap();
    assert_eq!(c.impact_level, ImpactLevel::Transitive);
}

#[test]
fn test_affected_cycle_terminates() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:b.ts:function:b", "a", "a:.:a.ts:function:a"),
        edge("a", "a:.:a.ts:function:a", "b", "b:.:b.ts:function:b"),
    ])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(&["a:.:a.ts:function:a".to_string()], &AffectedOptions::default())
        .unwrap();
    // Finite result despite the A→B→A cycle.
    assert_eq!(result.total_affected, 1);
    assert!(!result.truncated);
}

#[test]
fn test_affected_max_depth_zero() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_cross_repo_edges(&[edge("b", "b:.:b.ts:function:b", "a", "a:.:a.ts:function:a")])
        .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(
            &["a:.:a.ts:function:a".to_string()],
            &AffectedOptions {
                max_depth: 0,
                ..AffectedOptions::default()
            },
        )
        .unwrap();
    assert!(result.affected_repos.is_empty());
    assert_eq!(result.changed_entities.len(), 1);
}

#[test]
fn test_affected_empty_changed_set() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer.analyze(&[], &AffectedOptions::default()).unwrap();
    assert!(result.affected_repos.is_empty());
    assert_eq!(result.total_affected, 0);
}

#[test]
fn test_affected_repeat_analysis_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:b.ts:function:b", "a", "a:.:a.ts:function:a"),
        edge("c", "c:.:c.ts:function:c", "a", "a:.:a.ts:function:a"),
    ])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let changed = vec!["a:.:a.ts:function:a".to_string()];
    let first = analyzer.analyze(&changed, &AffectedOptions::default()).unwrap();
    let second = analyzer.analyze(&changed, &AffectedOptions::default()).unwrap();
    assert_eq!(first.total_affected, second.total_affected);
    let repos_first: Vec<_> = first.affected_repos.iter().map(|r| &r.repo_id).collect();
    let repos_second: Vec<_> = second.affected_repos.iter().map(|r| &r.repo_id).collect();
    assert_eq!(repos_first, repos_second);
}

#[test]
fn test_affected_exclude_filter_keeps_closure_accurate() {
    let dir = TempDir::new().unwrap();
    let hub = hub(&dir);
    // a ← b ← c: excluding b from the result must not hide c.
    hub.add_cross_repo_edges(&[
        edge("b", "b:.:b.ts:function:b", "a", "a:.:a.ts:function:a"),
        edge("c", "c:.:c.ts:function:c", "b", "b:.:b.ts:function:b"),
    ])
    .unwrap();

    let analyzer = AffectedAnalyzer::new(&hub);
    let result = analyzer
        .analyze(
            &["a:.:a.ts:function:a".to_string()],
            &AffectedOptions {
                exclude_repos: vec!["b".to_string()],
                ..AffectedOptions::default()
            },
        )
        .unwrap();
    assert_eq!(result.affected_repos.len(), 1);
    assert_eq!(result.affected_repos[0].repo_id, "c");
}
