//! Batched seed writes with per-package locking and atomic renames

use crate::layout::{self, Table};
use crate::lock::{LockConfig, SeedLock};
use crate::meta::SeedMeta;
use crate::{reader, schema};
use arrow::record_batch::RecordBatch;
use devac_core::{
    DevacError, EdgeRecord, EffectRecord, ExternalRefRecord, NodeRecord, now_millis,
};
use parquet::arrow::ArrowWriter;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique temp-file name next to the final path, for the write-then-rename
/// protocol. Same directory, so the rename stays on one filesystem.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("table");
    let nonce = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!("{name}.tmp.{}-{nonce:x}", std::process::id()))
}

fn write_table(dir: &Path, table: Table, batch: RecordBatch) -> Result<(), DevacError> {
    let final_path = dir.join(table.file_name());
    let tmp = temp_sibling(&final_path);
    let file = File::create(&tmp)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| DevacError::Internal(format!("parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| DevacError::Internal(format!("parquet write: {e}")))?;
    writer
        .close()
        .map_err(|e| DevacError::Internal(format!("parquet close: {e}")))?;
    std::fs::rename(&tmp, &final_path)?;
    Ok(())
}

/// One parsed file's records, staged for the next flush.
#[derive(Debug, Clone, Default)]
pub struct StagedFile {
    /// File path relative to the package root, forward slashes.
    pub rel_path: String,
    pub source_file_hash: String,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub external_refs: Vec<ExternalRefRecord>,
    pub effects: Vec<EffectRecord>,
}

impl StagedFile {
    fn row_count(&self) -> usize {
        self.nodes.len() + self.edges.len() + self.external_refs.len() + self.effects.len()
    }
}

/// Row counts written by one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    pub external_refs: usize,
    pub effects: usize,
}

/// Buffers parser output per file and persists it per package with the
/// upsert-by-primary-key + tombstone discipline.
pub struct SeedWriter {
    package: PathBuf,
    branch: String,
    lock_config: LockConfig,
    pending: Vec<StagedFile>,
    tombstoned_files: Vec<String>,
    pending_rows: usize,
    flush_threshold_rows: usize,
}

impl SeedWriter {
    pub fn new(package: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        SeedWriter {
            package: package.into(),
            branch: branch.into(),
            lock_config: LockConfig::default(),
            pending: Vec::new(),
            tombstoned_files: Vec::new(),
            pending_rows: 0,
            flush_threshold_rows: 50_000,
        }
    }

    pub fn with_flush_threshold(mut self, rows: usize) -> Self {
        self.flush_threshold_rows = rows;
        self
    }

    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.lock_config = config;
        self
    }

    pub fn pending_rows(&self) -> usize {
        self.pending_rows
    }

    /// Stage one file's parse output. Flushes automatically once the row
    /// threshold is reached; returns the stats when that happens.
    pub fn stage_file(&mut self, staged: StagedFile) -> Result<Option<FlushStats>, DevacError> {
        self.pending_rows += staged.row_count();
        self.pending.push(staged);
        if self.pending_rows >= self.flush_threshold_rows {
            return Ok(Some(self.flush()?));
        }
        Ok(None)
    }

    /// Mark a removed file: all its rows become tombstones on next flush.
    pub fn tombstone_file(&mut self, rel_path: impl Into<String>) {
        self.tombstoned_files.push(rel_path.into());
    }

    /// Persist everything staged. One lock acquisition covers all four
    /// tables and the meta update.
    pub fn flush(&mut self) -> Result<FlushStats, DevacError> {
        if self.pending.is_empty() && self.tombstoned_files.is_empty() {
            return Ok(FlushStats::default());
        }

        let _lock = SeedLock::acquire(&self.package, self.lock_config)?;
        let dir = layout::partition_dir(&self.package, &self.branch);
        std::fs::create_dir_all(&dir)?;

        let staged = std::mem::take(&mut self.pending);
        let tombstoned: HashSet<String> = std::mem::take(&mut self.tombstoned_files).into_iter().collect();
        self.pending_rows = 0;

        let nodes = merge_table(
            reader::read_partition_nodes(&self.package, &self.branch)?.unwrap_or_default(),
            &staged,
            &tombstoned,
            |f| f.nodes.clone(),
            |r| r.entity_id.clone(),
            |r| Some(r.file_path.as_str()),
            |r| {
                r.is_deleted = true;
                r.updated_at = now_millis();
            },
        );
        let edges = merge_table(
            reader::read_partition_edges(&self.package, &self.branch)?.unwrap_or_default(),
            &staged,
            &tombstoned,
            |f| f.edges.clone(),
            |r| r.key(),
            |r| r.file_path.as_deref(),
            |r| {
                r.is_deleted = true;
                r.updated_at = now_millis();
            },
        );
        let refs = merge_table(
            reader::read_partition_external_refs(&self.package, &self.branch)?.unwrap_or_default(),
            &staged,
            &tombstoned,
            |f| f.external_refs.clone(),
            |r| r.key(),
            |r| Some(r.file_path.as_str()),
            |r| {
                r.is_deleted = true;
                r.updated_at = now_millis();
            },
        );
        let effects = merge_table(
            reader::read_partition_effects(&self.package, &self.branch)?.unwrap_or_default(),
            &staged,
            &tombstoned,
            |f| f.effects.clone(),
            |r| r.effect_id.clone(),
            |r| Some(r.file_path.as_str()),
            |r| {
                r.is_deleted = true;
                r.updated_at = now_millis();
            },
        );

        write_table(&dir, Table::Nodes, schema::nodes_to_batch(&nodes)?)?;
        write_table(&dir, Table::Edges, schema::edges_to_batch(&edges)?)?;
        write_table(&dir, Table::ExternalRefs, schema::external_refs_to_batch(&refs)?)?;
        write_table(&dir, Table::Effects, schema::effects_to_batch(&effects)?)?;

        let mut meta = SeedMeta::load_or_new(&self.package, &self.branch)?;
        for file in &staged {
            meta.file_hashes
                .insert(file.rel_path.clone(), file.source_file_hash.clone());
        }
        for file in &tombstoned {
            meta.file_hashes.remove(file);
        }
        meta.touch();
        meta.save(&self.package, &self.branch)?;

        let stats = FlushStats {
            files: staged.len(),
            nodes: nodes.len(),
            edges: edges.len(),
            external_refs: refs.len(),
            effects: effects.len(),
        };
        tracing::debug!(
            "Flushed {} files to {} ({} nodes, {} edges)",
            stats.files,
            dir.display(),
            stats.nodes,
            stats.edges
        );
        Ok(stats)
    }

    /// Upsert edges directly, outside the per-file staging path. Used by
    /// the resolver to write rebound edges back (tombstoning the
    /// superseded unresolved rows in the same batch).
    pub fn upsert_edges(&self, records: Vec<EdgeRecord>) -> Result<(), DevacError> {
        self.upsert(records, Table::Edges, |r| r.key(), reader::read_partition_edges, schema::edges_to_batch)
    }

    /// Upsert external refs directly (resolver write-back).
    pub fn upsert_external_refs(&self, records: Vec<ExternalRefRecord>) -> Result<(), DevacError> {
        self.upsert(
            records,
            Table::ExternalRefs,
            |r| r.key(),
            reader::read_partition_external_refs,
            schema::external_refs_to_batch,
        )
    }

    fn upsert<T: Clone, K: Ord>(
        &self,
        records: Vec<T>,
        table: Table,
        key_of: impl Fn(&T) -> K,
        read: impl Fn(&Path, &str) -> Result<Option<Vec<T>>, DevacError>,
        to_batch: impl Fn(&[T]) -> Result<RecordBatch, DevacError>,
    ) -> Result<(), DevacError> {
        if records.is_empty() {
            return Ok(());
        }
        let _lock = SeedLock::acquire(&self.package, self.lock_config)?;
        let dir = layout::partition_dir(&self.package, &self.branch);
        std::fs::create_dir_all(&dir)?;

        let mut map: BTreeMap<K, T> = read(&self.package, &self.branch)?
            .unwrap_or_default()
            .into_iter()
            .map(|r| (key_of(&r), r))
            .collect();
        for record in records {
            map.insert(key_of(&record), record);
        }
        let rows: Vec<T> = map.into_values().collect();
        write_table(&dir, table, to_batch(&rows)?)?;

        let mut meta = SeedMeta::load_or_new(&self.package, &self.branch)?;
        meta.touch();
        meta.save(&self.package, &self.branch)?;
        Ok(())
    }

    pub fn package(&self) -> &Path {
        &self.package
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }
}

/// Upsert staged rows over existing ones. Rows that belonged to a staged or
/// tombstoned file but were not re-emitted become tombstones, so they keep
/// shadowing same-key base rows from a branch partition.
fn merge_table<T: Clone, K: Ord>(
    existing: Vec<T>,
    staged: &[StagedFile],
    tombstoned_files: &HashSet<String>,
    rows_of: impl Fn(&StagedFile) -> Vec<T>,
    key_of: impl Fn(&T) -> K,
    file_of: impl Fn(&T) -> Option<&str>,
    tombstone: impl Fn(&mut T),
) -> Vec<T> {
    let staged_files: HashSet<&str> = staged.iter().map(|f| f.rel_path.as_str()).collect();
    let fresh: Vec<T> = staged.iter().flat_map(|f| rows_of(f)).collect();
    let fresh_keys: std::collections::BTreeSet<K> = fresh.iter().map(&key_of).collect();

    let mut map: BTreeMap<K, T> = existing
        .into_iter()
        .map(|row| (key_of(&row), row))
        .collect();

    for row in map.values_mut() {
        let from_file = file_of(row).map_or(false, |f| {
            staged_files.contains(f) || tombstoned_files.contains(f)
        });
        if from_file && !fresh_keys.contains(&key_of(row)) {
            tombstone(row);
        }
    }
    for row in fresh {
        map.insert(key_of(&row), row);
    }
    map.into_values().collect()
}
