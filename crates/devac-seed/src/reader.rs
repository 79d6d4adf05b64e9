//! Seed reads: raw partitions and the base+branch unified view

use crate::layout::{self, Table};
use crate::schema;
use arrow::record_batch::RecordBatch;
use devac_core::{
    BRANCH_BASE, DevacError, EdgeRecord, EffectRecord, ExternalRefRecord, NodeRecord,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Read all record batches of one partition table. `Ok(None)` means the
/// file is absent, or was corrupt and has been quarantined; callers
/// proceed with the other side of the overlay.
fn read_batches(path: &Path) -> Result<Option<Vec<RecordBatch>>, DevacError> {
    if !path.exists() {
        return Ok(None);
    }
    let result = (|| -> Result<Vec<RecordBatch>, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| e.to_string())?
            .build()
            .map_err(|e| e.to_string())?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch.map_err(|e| e.to_string())?);
        }
        Ok(batches)
    })();
    match result {
        Ok(batches) => Ok(Some(batches)),
        Err(reason) => {
            quarantine(path, &reason);
            Ok(None)
        }
    }
}

/// Rename a corrupt file aside so the next analysis can rebuild it.
fn quarantine(path: &Path, reason: &str) {
    let stamp = chrono::Utc::now().timestamp();
    let quarantined = path.with_file_name(format!(
        "{}.corrupt.{stamp}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("table")
    ));
    tracing::warn!(
        "Quarantining corrupt seed file {} -> {}: {reason}",
        path.display(),
        quarantined.display()
    );
    if let Err(e) = std::fs::rename(path, &quarantined) {
        tracing::warn!("Failed to quarantine {}: {e}", path.display());
    }
}

macro_rules! partition_reader {
    ($name:ident, $table:expr, $convert:path, $record:ty) => {
        /// Read one partition of this table. `Ok(None)` when absent or
        /// quarantined.
        pub fn $name(package: &Path, branch: &str) -> Result<Option<Vec<$record>>, DevacError> {
            let path = layout::table_path(package, branch, $table);
            let Some(batches) = read_batches(&path)? else {
                return Ok(None);
            };
            let mut rows = Vec::new();
            for batch in &batches {
                match $convert(batch, &path) {
                    Ok(mut converted) => rows.append(&mut converted),
                    Err(DevacError::CorruptSeed { reason, .. }) => {
                        quarantine(&path, &reason);
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(Some(rows))
        }
    };
}

partition_reader!(read_partition_nodes, Table::Nodes, schema::batch_to_nodes, NodeRecord);
partition_reader!(read_partition_edges, Table::Edges, schema::batch_to_edges, EdgeRecord);
partition_reader!(
    read_partition_external_refs,
    Table::ExternalRefs,
    schema::batch_to_external_refs,
    ExternalRefRecord
);
partition_reader!(read_partition_effects, Table::Effects, schema::batch_to_effects, EffectRecord);

/// Base rows overlaid with branch rows: a branch key hides the base row,
/// and tombstones drop out of the visible set entirely.
fn overlay<T, K: Ord>(
    base: Option<Vec<T>>,
    delta: Option<Vec<T>>,
    key_of: impl Fn(&T) -> K,
    is_deleted: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut map: BTreeMap<K, T> = base
        .unwrap_or_default()
        .into_iter()
        .map(|row| (key_of(&row), row))
        .collect();
    for row in delta.unwrap_or_default() {
        map.insert(key_of(&row), row);
    }
    map.into_values().filter(|row| !is_deleted(row)).collect()
}

/// Unified read view over one package's seed.
pub struct SeedReader {
    package: PathBuf,
    branch: String,
}

impl SeedReader {
    pub fn new(package: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        SeedReader {
            package: package.into(),
            branch: branch.into(),
        }
    }

    fn is_base(&self) -> bool {
        self.branch == BRANCH_BASE
    }

    pub fn read_nodes(&self) -> Result<Vec<NodeRecord>, DevacError> {
        let base = read_partition_nodes(&self.package, BRANCH_BASE)?;
        let delta = if self.is_base() {
            None
        } else {
            read_partition_nodes(&self.package, &self.branch)?
        };
        Ok(overlay(base, delta, |r| r.entity_id.clone(), |r| r.is_deleted))
    }

    pub fn read_edges(&self) -> Result<Vec<EdgeRecord>, DevacError> {
        let base = read_partition_edges(&self.package, BRANCH_BASE)?;
        let delta = if self.is_base() {
            None
        } else {
            read_partition_edges(&self.package, &self.branch)?
        };
        Ok(overlay(base, delta, |r| r.key(), |r| r.is_deleted))
    }

    pub fn read_external_refs(&self) -> Result<Vec<ExternalRefRecord>, DevacError> {
        let base = read_partition_external_refs(&self.package, BRANCH_BASE)?;
        let delta = if self.is_base() {
            None
        } else {
            read_partition_external_refs(&self.package, &self.branch)?
        };
        Ok(overlay(base, delta, |r| r.key(), |r| r.is_deleted))
    }

    pub fn read_effects(&self) -> Result<Vec<EffectRecord>, DevacError> {
        let base = read_partition_effects(&self.package, BRANCH_BASE)?;
        let delta = if self.is_base() {
            None
        } else {
            read_partition_effects(&self.package, &self.branch)?
        };
        Ok(overlay(base, delta, |r| r.effect_id.clone(), |r| r.is_deleted))
    }

    pub fn package(&self) -> &Path {
        &self.package
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }
}
