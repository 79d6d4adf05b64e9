//! Query engine tests over real seed fixtures

use crate::{EngineConfig, QueryEngine};
use devac_core::{BRANCH_BASE, NodeKind, NodeRecord, now_millis};
use devac_seed::{SeedWriter, StagedFile};
use tempfile::TempDir;

fn node(entity_id: &str, name: &str, file: &str, branch: &str) -> NodeRecord {
    NodeRecord {
        entity_id: entity_id.to_string(),
        name: name.to_string(),
        qualified_name: format!("{file}::{name}"),
        kind: NodeKind::Function,
        file_path: file.to_string(),
        start_line: 1,
        end_line: 2,
        start_column: 0,
        end_column: 0,
        is_exported: true,
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
        source_file_hash: "h".to_string(),
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: now_millis(),
    }
}

fn seed_package(dir: &TempDir, branch: &str, nodes: Vec<NodeRecord>) {
    let mut writer = SeedWriter::new(dir.path(), branch);
    writer
        .stage_file(StagedFile {
            rel_path: "src/a.ts".to_string(),
            source_file_hash: "h".to_string(),
            nodes,
            ..StagedFile::default()
        })
        .unwrap();
    writer.flush().unwrap();
}

#[test]
fn test_setup_views_and_query() {
    let dir = TempDir::new().unwrap();
    seed_package(
        &dir,
        BRANCH_BASE,
        vec![node("n1", "alpha", "src/a.ts", BRANCH_BASE), node("n2", "beta", "src/a.ts", BRANCH_BASE)],
    );

    let engine = QueryEngine::with_defaults().unwrap();
    let created = engine
        .setup_views(&[dir.path().to_path_buf()], BRANCH_BASE)
        .unwrap();
    assert!(created.contains(&"devac_nodes".to_string()));

    let rows = engine
        .execute("SELECT name FROM {nodes} ORDER BY name")
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "alpha");
    assert_eq!(rows[1]["name"], "beta");

    let count = engine.execute_count("SELECT COUNT(*) FROM {nodes}").unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_views_apply_branch_overlay() {
    let dir = TempDir::new().unwrap();
    let mut v1 = node("h1", "helper", "src/a.ts", BRANCH_BASE);
    v1.signature = Some("v1".to_string());
    seed_package(&dir, BRANCH_BASE, vec![v1]);

    let mut v2 = node("h1", "helper", "src/a.ts", "feature");
    v2.signature = Some("v2".to_string());
    seed_package(&dir, "feature", vec![v2]);

    let engine = QueryEngine::with_defaults().unwrap();
    engine
        .setup_views(&[dir.path().to_path_buf()], "feature")
        .unwrap();
    let rows = engine
        .execute("SELECT signature FROM {nodes} WHERE entity_id = 'h1'")
        .unwrap();
    assert_eq!(rows.len(), 1, "delta row must hide the base row");
    assert_eq!(rows[0]["signature"], "v2");
}

#[test]
fn test_placeholder_before_setup_is_input_error() {
    let engine = QueryEngine::with_defaults().unwrap();
    let err = engine.execute("SELECT * FROM {nodes}").unwrap_err();
    assert!(matches!(err, devac_core::DevacError::Input(_)));
}

#[test]
fn test_setup_views_missing_all_packages() {
    let dir = TempDir::new().unwrap();
    let engine = QueryEngine::with_defaults().unwrap();
    let err = engine
        .setup_views(&[dir.path().to_path_buf()], BRANCH_BASE)
        .unwrap_err();
    assert!(matches!(err, devac_core::DevacError::NotFound(_)));
}

#[test]
fn test_readiness() {
    let seeded = TempDir::new().unwrap();
    seed_package(&seeded, BRANCH_BASE, vec![node("n1", "a", "src/a.ts", BRANCH_BASE)]);
    let missing = TempDir::new().unwrap();

    let ready = QueryEngine::readiness(
        &[seeded.path().to_path_buf(), missing.path().to_path_buf()],
        BRANCH_BASE,
    );
    assert!(ready.ready);
    assert_eq!(ready.available_count, 1);
    assert_eq!(ready.missing_count, 1);

    let not_ready = QueryEngine::readiness(&[missing.path().to_path_buf()], BRANCH_BASE);
    assert!(!not_ready.ready);
    assert!(not_ready.reason.is_some());
    assert!(not_ready.suggestion.is_some());
}

#[test]
fn test_close_is_idempotent_and_rejects_queries() {
    let engine = QueryEngine::with_defaults().unwrap();
    engine.close();
    engine.close();
    assert!(engine.is_closed());
    let err = engine.execute("SELECT 1").unwrap_err();
    assert!(matches!(err, devac_core::DevacError::NotInitialized));
}

#[test]
fn test_plain_sql_without_placeholders() {
    let engine = QueryEngine::new(EngineConfig {
        pool_size: 2,
        memory_limit: None,
    })
    .unwrap();
    let count = engine.execute_count("SELECT 40 + 2").unwrap();
    assert_eq!(count, 42);
}
