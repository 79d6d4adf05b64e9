//! Package-level analysis orchestration
//!
//! Walks a package with gitignore-aware filtering, parses source files in
//! parallel, and hands the results to the seed writer. Per-file failures
//! are collected into the report; only infrastructure failures (lock
//! timeout, storage errors) abort the package.

use crate::languages::{self, parser_for};
use crate::parser_pool::{ParserPool, create_parser_pool};
use crate::{LanguageParser, ParserConfig};
use devac_core::{DevacError, Language, identity};
use devac_seed::{SeedMeta, SeedWriter, StagedFile};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One per-file failure inside an otherwise successful package run.
#[derive(Debug, Clone)]
pub struct FileError {
    pub file: String,
    pub message: String,
}

/// Outcome of analyzing one package.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub nodes: usize,
    pub edges: usize,
    pub external_refs: usize,
    pub effects: usize,
    pub errors: Vec<FileError>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

/// Orchestrates parsing + persistence for whole packages.
pub struct PackageAnalyzer {
    pool: ParserPool,
}

impl PackageAnalyzer {
    pub fn new() -> Self {
        PackageAnalyzer {
            pool: create_parser_pool(),
        }
    }

    pub fn with_pool(pool: ParserPool) -> Self {
        PackageAnalyzer { pool }
    }

    /// Analyze every supported source file under `package_dir` and persist
    /// the records to the package seed. Unchanged files (same content hash
    /// as recorded in meta.json) are skipped unless `force` is set.
    pub fn analyze_package(
        &self,
        package_dir: &Path,
        cfg: &ParserConfig,
        force: bool,
    ) -> Result<AnalysisReport, DevacError> {
        let started = Instant::now();
        let mut report = AnalysisReport::default();

        let known_hashes = SeedMeta::load_or_new(package_dir, &cfg.branch)?.file_hashes;
        let mut to_parse: Vec<(PathBuf, Language)> = Vec::new();

        for entry in WalkBuilder::new(package_dir).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.warnings.push(format!("walk error: {e}"));
                    continue;
                }
            };
            if !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(language) = Language::from_path(path) else {
                continue;
            };
            let rel = path
                .strip_prefix(package_dir)
                .unwrap_or(path)
                .to_path_buf();
            let rel_str = devac_core::normalize_path(&rel);

            if !cfg.recognize_test_files && languages::is_test_file(&rel_str) {
                report.files_skipped += 1;
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > cfg.max_file_bytes {
                report.warnings.push(format!(
                    "{rel_str}: {size} bytes exceeds max_file_bytes, skipped"
                ));
                report.files_skipped += 1;
                continue;
            }
            if !force {
                if let Ok(hash) = identity::file_hash(path) {
                    if known_hashes.get(&rel_str).map(String::as_str) == Some(hash.as_str()) {
                        report.files_skipped += 1;
                        continue;
                    }
                }
            }
            to_parse.push((rel, language));
        }

        let ts_parser = parser_for(Language::TypeScript, self.pool.clone());
        let py_parser = parser_for(Language::Python, self.pool.clone());
        let cs_parser = parser_for(Language::CSharp, self.pool.clone());

        let deadline_ms = cfg.file_timeout_ms.saturating_mul(to_parse.len().max(1) as u64);
        let parsed: Vec<_> = to_parse
            .par_iter()
            .map(|(rel, language)| {
                if started.elapsed().as_millis() as u64 > deadline_ms {
                    return (
                        rel.clone(),
                        Err(DevacError::Cancelled(format!(
                            "package deadline exceeded before {}",
                            rel.display()
                        ))),
                    );
                }
                let parser: &dyn LanguageParser = match language {
                    Language::TypeScript | Language::JavaScript => ts_parser.as_ref(),
                    Language::Python => py_parser.as_ref(),
                    Language::CSharp => cs_parser.as_ref(),
                };
                let result = std::fs::read(package_dir.join(rel))
                    .map_err(DevacError::from)
                    .and_then(|content| parser.parse(rel, &content, cfg));
                (rel.clone(), result)
            })
            .collect();

        let mut writer = SeedWriter::new(package_dir, cfg.branch.clone());
        for (rel, result) in parsed {
            let rel_str = devac_core::normalize_path(&rel);
            match result {
                Ok(parse) => {
                    report.files_analyzed += 1;
                    report.nodes += parse.nodes.len();
                    report.edges += parse.edges.len();
                    report.external_refs += parse.external_refs.len();
                    report.effects += parse.effects.len();
                    report.warnings.extend(parse.warnings.iter().cloned());
                    let _ = writer.stage_file(StagedFile {
                        rel_path: rel_str,
                        source_file_hash: parse.source_file_hash.clone(),
                        nodes: parse.nodes,
                        edges: parse.edges,
                        external_refs: parse.external_refs,
                        effects: parse.effects,
                    })?;
                }
                Err(e) => {
                    tracing::warn!("Failed to analyze {rel_str}: {e}");
                    report.files_failed += 1;
                    report.errors.push(FileError {
                        file: rel_str,
                        message: e.to_string(),
                    });
                }
            }
        }

        // Files that vanished since the last run lose their rows.
        for known in known_hashes.keys() {
            if !package_dir.join(known).exists() {
                writer.tombstone_file(known.clone());
            }
        }

        writer.flush()?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Analyzed {} files ({} skipped, {} failed) in {}ms",
            report.files_analyzed,
            report.files_skipped,
            report.files_failed,
            report.duration_ms
        );
        Ok(report)
    }
}

impl Default for PackageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
