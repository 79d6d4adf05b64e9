//! Cross-language analyzer tests

use crate::analyzer::PackageAnalyzer;
use crate::ParserConfig;
use devac_core::BRANCH_BASE;
use devac_seed::SeedReader;
use std::fs;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir) {
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/helper.ts"),
        "export function helper(): number { return 1; }\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/consumer.ts"),
        "import { helper } from './helper';\nexport function consume() { return helper(); }\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/jobs.py"),
        "import requests\n\ndef sync():\n    return requests.get('https://x')\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/Worker.cs"),
        "namespace Jobs;\n\npublic class Worker\n{\n    public void Run() { }\n}\n",
    )
    .unwrap();
    // Not a supported language; must be ignored.
    fs::write(dir.path().join("src/notes.md"), "# notes\n").unwrap();
}

#[test]
fn test_analyze_package_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("fixture", ".", BRANCH_BASE);
    let report = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();

    assert_eq!(report.files_analyzed, 4);
    assert_eq!(report.files_failed, 0);
    assert!(report.nodes > 4, "module + symbol nodes expected");

    let reader = SeedReader::new(dir.path(), BRANCH_BASE);
    let nodes = reader.read_nodes().unwrap();
    assert!(nodes.iter().any(|n| n.name == "helper"));
    assert!(nodes.iter().any(|n| n.name == "consume"));
    assert!(nodes.iter().any(|n| n.name == "sync"));
    assert!(nodes.iter().any(|n| n.name == "Worker"));

    // The cross-file call stays unresolved until the resolver runs.
    let edges = reader.read_edges().unwrap();
    assert!(
        edges
            .iter()
            .any(|e| e.target_entity_id == "unresolved:helper"),
        "consumer.ts call to helper should be unresolved"
    );

    let refs = reader.read_external_refs().unwrap();
    assert!(refs.iter().any(|r| r.module_specifier == "./helper"));
    assert!(refs.iter().any(|r| r.module_specifier == "requests"));
}

#[test]
fn test_second_run_skips_unchanged_files() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("fixture", ".", BRANCH_BASE);
    let first = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();
    assert_eq!(first.files_analyzed, 4);

    let second = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();
    assert_eq!(second.files_analyzed, 0);
    assert_eq!(second.files_skipped, 4);

    // Force re-analyzes everything.
    let forced = analyzer.analyze_package(dir.path(), &cfg, true).unwrap();
    assert_eq!(forced.files_analyzed, 4);
}

#[test]
fn test_removed_file_rows_disappear() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("fixture", ".", BRANCH_BASE);
    analyzer.analyze_package(dir.path(), &cfg, false).unwrap();

    fs::remove_file(dir.path().join("src/helper.ts")).unwrap();
    analyzer.analyze_package(dir.path(), &cfg, false).unwrap();

    let nodes = SeedReader::new(dir.path(), BRANCH_BASE).read_nodes().unwrap();
    assert!(!nodes.iter().any(|n| n.name == "helper"));
    assert!(nodes.iter().any(|n| n.name == "consume"));
}

#[test]
fn test_test_files_skipped_by_default() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/app.ts"), "export const app = 1;\n").unwrap();
    fs::write(
        dir.path().join("src/app.test.ts"),
        "import { app } from './app';\n",
    )
    .unwrap();

    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("fixture", ".", BRANCH_BASE);
    let report = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();
    assert_eq!(report.files_analyzed, 1);
    assert_eq!(report.files_skipped, 1);

    let mut with_tests = ParserConfig::new("fixture", ".", BRANCH_BASE);
    with_tests.recognize_test_files = true;
    let report = analyzer.analyze_package(dir.path(), &with_tests, true).unwrap();
    assert_eq!(report.files_analyzed, 2);
}

#[test]
fn test_broken_file_is_collected_not_fatal() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/ok.ts"), "export const ok = 1;\n").unwrap();
    fs::write(dir.path().join("src/broken.py"), b"def broken(:\n    \xff\xfe\n".as_slice()).unwrap();

    let analyzer = PackageAnalyzer::new();
    let cfg = ParserConfig::new("fixture", ".", BRANCH_BASE);
    let report = analyzer.analyze_package(dir.path(), &cfg, false).unwrap();

    // The invalid file produces a warning (invalid UTF-8 → empty result)
    // rather than failing the package.
    assert_eq!(report.files_failed, 0);
    assert!(!report.warnings.is_empty());
    assert!(report.files_analyzed >= 1);
}
