//! Unit tests for seed storage

use crate::reader::SeedReader;
use crate::writer::{SeedWriter, StagedFile};
use crate::{SeedMeta, layout};
use devac_core::{
    BRANCH_BASE, EdgeKind, EdgeRecord, EffectPayload, EffectRecord, ExternalRefRecord, NodeKind,
    NodeRecord, now_millis,
};
use std::path::Path;
use tempfile::TempDir;

fn node(entity_id: &str, name: &str, file: &str, branch: &str) -> NodeRecord {
    NodeRecord {
        entity_id: entity_id.to_string(),
        name: name.to_string(),
        qualified_name: format!("{file}::{name}"),
        kind: NodeKind::Function,
        file_path: file.to_string(),
        start_line: 1,
        end_line: 5,
        start_column: 0,
        end_column: 0,
        is_exported: true,
        is_default_export: false,
        visibility: None,
        is_async: false,
        is_generator: false,
        is_static: false,
        is_abstract: false,
        signature: Some(format!("{name}()")),
        doc: None,
        decorators: vec!["memoize".to_string()],
        type_parameters: Vec::new(),
        source_file_hash: "hash".to_string(),
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: now_millis(),
    }
}

fn edge(source: &str, target: &str, file: &str, branch: &str) -> EdgeRecord {
    EdgeRecord {
        source_entity_id: source.to_string(),
        target_entity_id: target.to_string(),
        edge_type: EdgeKind::Calls,
        file_path: Some(file.to_string()),
        line: Some(3),
        column: Some(4),
        properties: None,
        source_file_hash: "hash".to_string(),
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: now_millis(),
    }
}

fn external_ref(source: &str, specifier: &str, symbol: &str, file: &str, branch: &str) -> ExternalRefRecord {
    ExternalRefRecord {
        source_entity_id: source.to_string(),
        module_specifier: specifier.to_string(),
        imported_symbol: symbol.to_string(),
        is_type_only: false,
        is_default: false,
        is_namespace: false,
        file_path: file.to_string(),
        line: 1,
        column: 0,
        is_resolved: false,
        target_entity_id: None,
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: now_millis(),
    }
}

fn effect(id: &str, source: &str, file: &str, branch: &str) -> EffectRecord {
    EffectRecord {
        effect_id: id.to_string(),
        source_entity_id: source.to_string(),
        payload: EffectPayload::Store {
            target_resource: "users".to_string(),
            operation: "insert".to_string(),
        },
        file_path: file.to_string(),
        line: 4,
        column: 2,
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: now_millis(),
    }
}

fn staged(file: &str, branch: &str, nodes: Vec<NodeRecord>) -> StagedFile {
    StagedFile {
        rel_path: file.to_string(),
        source_file_hash: "hash".to_string(),
        nodes,
        ..StagedFile::default()
    }
}

#[test]
fn test_write_then_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(StagedFile {
            rel_path: "src/a.ts".to_string(),
            source_file_hash: "h1".to_string(),
            nodes: vec![node("r:.:src/a.ts:function:00000001", "a", "src/a.ts", BRANCH_BASE)],
            edges: vec![edge("r:.:src/a.ts:function:00000001", "unresolved:b", "src/a.ts", BRANCH_BASE)],
            external_refs: vec![external_ref(
                "r:.:src/a.ts:module:00000002",
                "./b",
                "b",
                "src/a.ts",
                BRANCH_BASE,
            )],
            effects: vec![effect("eff_1", "r:.:src/a.ts:function:00000001", "src/a.ts", BRANCH_BASE)],
        })
        .unwrap();
    let stats = writer.flush().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.nodes, 1);

    let reader = SeedReader::new(dir.path(), BRANCH_BASE);
    let nodes = reader.read_nodes().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "a");
    assert_eq!(nodes[0].decorators, vec!["memoize".to_string()]);

    let edges = reader.read_edges().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_entity_id, "unresolved:b");

    let refs = reader.read_external_refs().unwrap();
    assert_eq!(refs.len(), 1);
    assert!(!refs[0].is_resolved);
    assert!(refs[0].target_entity_id.is_none());

    let effects = reader.read_effects().unwrap();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].effect_type(), "Store");
}

#[test]
fn test_upsert_replaces_same_key() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);

    let mut v1 = node("id1", "f", "src/a.ts", BRANCH_BASE);
    v1.signature = Some("f(x)".to_string());
    writer.stage_file(staged("src/a.ts", BRANCH_BASE, vec![v1])).unwrap();
    writer.flush().unwrap();

    let mut v2 = node("id1", "f", "src/a.ts", BRANCH_BASE);
    v2.signature = Some("f(x, y)".to_string());
    writer.stage_file(staged("src/a.ts", BRANCH_BASE, vec![v2])).unwrap();
    writer.flush().unwrap();

    let nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].signature.as_deref(), Some("f(x, y)"));
}

#[test]
fn test_reanalysis_tombstones_dropped_symbols() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);

    writer
        .stage_file(staged(
            "src/a.ts",
            BRANCH_BASE,
            vec![
                node("id1", "kept", "src/a.ts", BRANCH_BASE),
                node("id2", "dropped", "src/a.ts", BRANCH_BASE),
            ],
        ))
        .unwrap();
    writer.flush().unwrap();

    // Re-analysis of the same file no longer emits `dropped`.
    writer
        .stage_file(staged("src/a.ts", BRANCH_BASE, vec![node("id1", "kept", "src/a.ts", BRANCH_BASE)]))
        .unwrap();
    writer.flush().unwrap();

    let nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "kept");

    // The tombstone row itself is persisted in the partition.
    let raw = crate::reader::read_partition_nodes(dir.path(), BRANCH_BASE)
        .unwrap()
        .unwrap();
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().any(|n| n.name == "dropped" && n.is_deleted));
}

#[test]
fn test_branch_overlay_hides_base_row() {
    let dir = TempDir::new().unwrap();

    let mut base_writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    let mut v1 = node("h1", "helper", "src/h.ts", BRANCH_BASE);
    v1.signature = Some("v1".to_string());
    base_writer.stage_file(staged("src/h.ts", BRANCH_BASE, vec![v1])).unwrap();
    base_writer.flush().unwrap();

    let mut branch_writer = SeedWriter::new(dir.path(), "feature");
    let mut v2 = node("h1", "helper", "src/h.ts", "feature");
    v2.signature = Some("v2".to_string());
    branch_writer.stage_file(staged("src/h.ts", "feature", vec![v2])).unwrap();
    branch_writer.flush().unwrap();

    // The branch view sees only the v2 row.
    let nodes = SeedReader::new(dir.path(), "feature").read_nodes().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].signature.as_deref(), Some("v2"));

    // Base is untouched.
    let base_nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert_eq!(base_nodes[0].signature.as_deref(), Some("v1"));
}

#[test]
fn test_branch_tombstone_hides_base_entirely() {
    let dir = TempDir::new().unwrap();

    let mut base_writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    base_writer
        .stage_file(staged("src/h.ts", BRANCH_BASE, vec![node("h1", "helper", "src/h.ts", BRANCH_BASE)]))
        .unwrap();
    base_writer.flush().unwrap();

    let mut branch_writer = SeedWriter::new(dir.path(), "feature");
    let mut tombstone = node("h1", "helper", "src/h.ts", "feature");
    tombstone.is_deleted = true;
    branch_writer
        .stage_file(staged("src/h.ts", "feature", vec![tombstone]))
        .unwrap();
    branch_writer.flush().unwrap();

    let nodes = SeedReader::new(dir.path(), "feature").read_nodes().unwrap();
    assert!(nodes.is_empty());

    // Removing the delta partition exposes the base row again.
    std::fs::remove_dir_all(layout::partition_dir(dir.path(), "feature")).unwrap();
    let nodes = SeedReader::new(dir.path(), "feature").read_nodes().unwrap();
    assert_eq!(nodes.len(), 1);
}

#[test]
fn test_corrupt_file_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(staged("src/a.ts", BRANCH_BASE, vec![node("id1", "a", "src/a.ts", BRANCH_BASE)]))
        .unwrap();
    writer.flush().unwrap();

    // Clobber the nodes table with junk.
    let nodes_path = layout::table_path(dir.path(), BRANCH_BASE, layout::Table::Nodes);
    std::fs::write(&nodes_path, b"this is not parquet").unwrap();

    let nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert!(nodes.is_empty());
    assert!(!nodes_path.exists(), "corrupt file should have been renamed aside");
    let quarantined: Vec<_> = std::fs::read_dir(nodes_path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt."))
        .collect();
    assert_eq!(quarantined.len(), 1);
}

#[test]
fn test_meta_records_file_hashes() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(StagedFile {
            rel_path: "src/a.ts".to_string(),
            source_file_hash: "abc123".to_string(),
            nodes: vec![node("id1", "a", "src/a.ts", BRANCH_BASE)],
            ..StagedFile::default()
        })
        .unwrap();
    writer.flush().unwrap();

    let meta = SeedMeta::load_or_new(dir.path(), BRANCH_BASE).unwrap();
    assert_eq!(meta.schema_version, crate::SCHEMA_VERSION);
    assert_eq!(meta.file_hashes.get("src/a.ts").map(String::as_str), Some("abc123"));

    // meta.json is camelCase on disk.
    let raw = std::fs::read_to_string(layout::meta_path(dir.path(), BRANCH_BASE)).unwrap();
    assert!(raw.contains("schemaVersion"));
    assert!(raw.contains("lastWrittenAt"));
    assert!(raw.contains("fileHashes"));
}

#[test]
fn test_tombstone_file_removes_all_rows() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(staged("src/a.ts", BRANCH_BASE, vec![node("id1", "a", "src/a.ts", BRANCH_BASE)]))
        .unwrap();
    writer.flush().unwrap();

    writer.tombstone_file("src/a.ts");
    writer.flush().unwrap();

    let nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert!(nodes.is_empty());
    let meta = SeedMeta::load_or_new(dir.path(), BRANCH_BASE).unwrap();
    assert!(!meta.file_hashes.contains_key("src/a.ts"));
}

#[test]
fn test_resolver_write_back_upsert() {
    let dir = TempDir::new().unwrap();
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(StagedFile {
            rel_path: "src/a.ts".to_string(),
            source_file_hash: "h".to_string(),
            external_refs: vec![external_ref("m1", "./b", "b", "src/a.ts", BRANCH_BASE)],
            ..StagedFile::default()
        })
        .unwrap();
    writer.flush().unwrap();

    let mut resolved = external_ref("m1", "./b", "b", "src/a.ts", BRANCH_BASE);
    resolved.is_resolved = true;
    resolved.target_entity_id = Some("r:.:src/b.ts:function:00000009".to_string());
    writer.upsert_external_refs(vec![resolved]).unwrap();

    let refs = SeedReader::new(dir.path(), BRANCH_BASE).read_external_refs().unwrap();
    assert_eq!(refs.len(), 1);
    assert!(refs[0].is_resolved);
    assert_eq!(
        refs[0].target_entity_id.as_deref(),
        Some("r:.:src/b.ts:function:00000009")
    );
}

#[test]
fn test_has_seed_detection() {
    let dir = TempDir::new().unwrap();
    assert!(!layout::has_seed(dir.path(), BRANCH_BASE));
    let mut writer = SeedWriter::new(dir.path(), BRANCH_BASE);
    writer
        .stage_file(staged("src/a.ts", BRANCH_BASE, vec![node("id1", "a", "src/a.ts", BRANCH_BASE)]))
        .unwrap();
    writer.flush().unwrap();
    assert!(layout::has_seed(dir.path(), BRANCH_BASE));
    assert!(layout::table_path(dir.path(), BRANCH_BASE, layout::Table::Nodes).exists());
    assert_eq!(
        layout::table_path(Path::new("pkg"), "base", layout::Table::Effects),
        Path::new("pkg/.devac/seed/base/effects.parquet")
    );
}
